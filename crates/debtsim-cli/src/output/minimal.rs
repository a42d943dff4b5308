use serde_json::Value;

/// Print just the headline figure from the output.
///
/// For a portfolio report the headline is the Difference row's total cost
/// (savings of the proposed structure over the existing one). For a single
/// schedule it is the contract's total cost; otherwise fall back to a
/// priority list of well-known fields, then to the first field.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Some(difference) = comparison_difference(result) {
        println!("{}", format_minimal(difference));
        return;
    }

    let priority_keys = ["total_cost", "irr_pct", "present_value", "payment"];

    if let Value::Object(map) = result {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result));
}

/// total_cost of the comparison's Difference row, when the result is a
/// portfolio report.
fn comparison_difference(result: &Value) -> Option<&Value> {
    result
        .get("comparison")?
        .as_array()?
        .iter()
        .find(|row| row.get("side").and_then(Value::as_str) == Some("Difference"))?
        .get("total_cost")
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
