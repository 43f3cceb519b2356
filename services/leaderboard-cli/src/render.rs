use leaderboard_sync::leaderboard::achievements::AchievementCatalog;
use leaderboard_sync::leaderboard::{
    AchievementId, DepartmentFilter, EligibilityPolicy, EligibilityVerdict, LeaderboardView,
};

const CHART_WIDTH: i64 = 30;

pub(crate) fn render_view(
    view: &LeaderboardView,
    catalog: &AchievementCatalog,
    chart_limit: usize,
) {
    let department = match &view.department {
        DepartmentFilter::All => "all departments".to_string(),
        DepartmentFilter::Only(name) => name.clone(),
    };
    println!(
        "{} leaderboard | {} | {}{}",
        view.organization,
        view.category.label(),
        department,
        if view.stale { " | STALE" } else { "" }
    );
    println!(
        "- {} eligible | {} excluded | sequence {} | computed {}",
        view.eligible_count,
        view.ineligible_count,
        view.sequence,
        view.computed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    if view.entries.is_empty() {
        println!("  (no eligible participants)");
        return;
    }

    for entry in &view.entries {
        let badge = entry
            .badge
            .map(|badge| format!(" [{}]", badge.label()))
            .unwrap_or_default();
        let department = entry.record.department.as_deref().unwrap_or("-");
        let achievements = if entry.record.achievements.is_empty() {
            String::new()
        } else {
            format!(
                " ({})",
                achievement_labels(catalog, &entry.record.achievements).join(", ")
            )
        };
        println!(
            "  {:>5}  {:<24} {:<16} {:>7}{}{}",
            entry.rank_label,
            entry.record.display_name,
            department,
            entry.score,
            badge,
            achievements
        );
    }

    let chart = view.chart_series(chart_limit);
    if !chart.is_empty() {
        println!("Top {} chart:", chart.len());
        let peak = chart.iter().map(|point| point.value).max().unwrap_or(0).max(1);
        for point in chart {
            let width = bar_width(point.value, peak);
            println!("  {:<24} {:>7} {}", point.label, point.value, "#".repeat(width));
        }
    }
}

pub(crate) fn render_catalog(catalog: &AchievementCatalog) {
    println!(
        "Achievement catalogue (all-rounder floor {})",
        catalog.all_rounder_floor()
    );
    for definition in catalog.definitions() {
        let rule = definition
            .rule(catalog.all_rounder_floor())
            .map(|rule| rule.to_string())
            .unwrap_or_else(|| "never unlocks".to_string());
        println!(
            "  {} {:<24} {:<24} {}",
            definition.icon, definition.name, definition.id, rule
        );
        if !definition.description.is_empty() {
            println!("      {}", definition.description);
        }
    }
}

pub(crate) fn render_verdict(
    role: &str,
    department: &str,
    verdict: &EligibilityVerdict,
    policy: &EligibilityPolicy,
) {
    println!(
        "role={role} department={department:?} -> {}",
        if verdict.eligible { "eligible" } else { "excluded" }
    );
    println!("  {}", verdict.reason);
    let excluded: Vec<&str> = policy.excluded_departments().collect();
    println!("  excluded departments: {}", excluded.join(", "));
}

/// Held ids resolved to `icon name`; ids missing from the catalogue are shown as stored.
fn achievement_labels<'a, I>(catalog: &AchievementCatalog, held: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a AchievementId>,
{
    held.into_iter()
        .map(|id| match catalog.find(id) {
            Some(definition) if definition.icon.is_empty() => definition.name.clone(),
            Some(definition) => format!("{} {}", definition.icon, definition.name),
            None => id.as_str().to_string(),
        })
        .collect()
}

fn bar_width(value: i64, peak: i64) -> usize {
    let peak = i128::from(peak.max(1));
    let scaled = i128::from(value.max(0)) * i128::from(CHART_WIDTH) / peak;
    usize::try_from(scaled).unwrap_or(0)
}
