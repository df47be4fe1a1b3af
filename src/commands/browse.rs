//! Read commands: show, list, search, summary and history

use crate::api::payload::{result_count, results};
use crate::catalog::SearchRecord;
use crate::models::EntityKind;
use crate::resolve::DataSource;
use serde_json::Value;

fn text<'a>(value: &'a Value, field: &str) -> &'a str {
    value.get(field).and_then(Value::as_str).unwrap_or("")
}

/// Length of whichever array field is present
fn array_len(value: &Value, fields: &[&str]) -> usize {
    fields
        .iter()
        .find_map(|f| value.get(*f).and_then(Value::as_array))
        .map_or(0, Vec::len)
}

fn nested_name<'a>(value: &'a Value, field: &str) -> &'a str {
    value
        .get(field)
        .and_then(|v| v.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}

fn upstream_id(value: &Value) -> &Value {
    // Locally served records carry the upstream id separately from the row id
    value.get("api_id").unwrap_or(&value["id"])
}

/// One-line description of a record in a list
fn summary_line(kind: EntityKind, item: &Value) -> String {
    let name = text(item, "name");
    let id = upstream_id(item);
    match kind {
        EntityKind::Character => format!(
            "#{} {} ({}, {})",
            id,
            name,
            text(item, "status"),
            text(item, "species")
        ),
        EntityKind::Episode => format!("#{} {} - {}", id, text(item, "episode"), name),
        EntityKind::Location => format!("#{} {} [{}]", id, name, text(item, "type")),
    }
}

/// Print a single record
pub fn print_item(kind: EntityKind, item: &Value, source: DataSource) {
    println!("\n{} (source: {})\n", text(item, "name"), source);
    println!("ID: {}", upstream_id(item));

    match kind {
        EntityKind::Character => {
            println!("Status: {}", text(item, "status"));
            println!("Species: {}", text(item, "species"));
            let subtype = text(item, "type");
            if !subtype.is_empty() {
                println!("Type: {}", subtype);
            }
            println!("Gender: {}", text(item, "gender"));
            println!("Origin: {}", nested_name(item, "origin"));
            println!("Location: {}", nested_name(item, "location"));
            println!("Episodes: {}", array_len(item, &["episode", "episodes"]));
        }
        EntityKind::Episode => {
            println!("Episode: {}", text(item, "episode"));
            println!("Air date: {}", text(item, "air_date"));
            println!("Characters: {}", array_len(item, &["characters"]));
        }
        EntityKind::Location => {
            println!("Type: {}", text(item, "type"));
            println!("Dimension: {}", text(item, "dimension"));
            println!("Residents: {}", array_len(item, &["residents"]));
        }
    }
}

/// Print a list or search page
pub fn print_page(kind: EntityKind, page: &Value, current: u32, source: DataSource) {
    let items = results(page);
    if items.is_empty() {
        println!("No {}s found. (source: {})", kind, source);
        return;
    }

    let pages = page
        .get("info")
        .and_then(|info| info.get("pages"))
        .and_then(Value::as_u64)
        .unwrap_or(1);
    println!(
        "\n{} {}(s), page {} of {} (source: {})\n",
        result_count(page),
        kind,
        current,
        pages,
        source
    );
    for item in items {
        println!("• {}", summary_line(kind, item));
    }
}

/// Print landing page counts
pub fn print_summary(summary: &Value, source: DataSource) {
    println!("\n🛸 citadel Summary (source: {})\n", source);
    println!("Characters: {}", summary["characters"]);
    println!("Episodes: {}", summary["episodes"]);
    println!("Locations: {}", summary["locations"]);

    if let Some(recent) = summary["recent_searches"].as_array() {
        if !recent.is_empty() {
            println!("\nRecent searches:");
            for search in recent {
                println!(
                    "  {} [{}] {} result(s)",
                    text(search, "query"),
                    text(search, "search_kind"),
                    search["results_count"]
                );
            }
        }
    }
}

/// Print the search ledger
pub fn print_history(records: &[SearchRecord]) {
    println!("\n🔎 Search History\n");

    if records.is_empty() {
        println!("No searches recorded yet.");
        return;
    }

    for record in records {
        println!(
            "{}  {:<10} {:<24} {} result(s)",
            record.created_at, record.search_kind, record.query, record.results_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_line_for_remote_and_local_shapes() {
        let remote = json!({"id": 1, "name": "Rick Sanchez", "status": "Alive", "species": "Human"});
        assert_eq!(
            summary_line(EntityKind::Character, &remote),
            "#1 Rick Sanchez (Alive, Human)"
        );

        let local = json!({"id": 17, "api_id": 28, "name": "The Ricklantis Mixup", "episode": "S03E07"});
        assert_eq!(
            summary_line(EntityKind::Episode, &local),
            "#28 S03E07 - The Ricklantis Mixup"
        );
    }

    #[test]
    fn test_relation_counts_for_both_shapes() {
        let remote = json!({"episode": ["https://x/api/episode/1", "https://x/api/episode/2"]});
        let local = json!({"episodes": [{"id": 1}]});
        assert_eq!(array_len(&remote, &["episode", "episodes"]), 2);
        assert_eq!(array_len(&local, &["episode", "episodes"]), 1);
        assert_eq!(nested_name(&json!({"origin": null}), "origin"), "unknown");
    }
}
