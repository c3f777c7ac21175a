use serde_json::Value;

/// Print just the key answer from the output.
///
/// A distribution collapses to one `class: payout` line per share class,
/// an analysis to one `exit: total` line per scenario; anything else falls
/// back to well-known fields, then the first field of the result object.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Value::Object(map) = result_obj {
        if let Some(Value::Object(payouts)) = map.get("payouts") {
            for (name, amount) in payouts {
                println!("{}: {}", name, format_minimal(amount));
            }
            return;
        }

        if let Some(Value::Array(scenarios)) = map.get("scenarios") {
            for scenario in scenarios {
                if let Value::Object(s) = scenario {
                    let exit = s.get("exit_value").map(format_minimal).unwrap_or_default();
                    let total = s
                        .get("total_distributed")
                        .map(format_minimal)
                        .unwrap_or_default();
                    println!("{}: {}", exit, total);
                }
            }
            return;
        }

        let priority_keys = ["total_distributed", "total_invested", "total_shares"];
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

    println!("{}", format_minimal(result_obj));
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
