use serde_json::Value;
use tabled::{Table, builder::Builder};

/// Format output as a table using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_flat_object(value);
            }
        }
        Value::Array(arr) => {
            print_array_table(arr);
        }
        _ => {
            println!("{}", value);
        }
    }
}

fn print_result_table(result: &Value, envelope: &serde_json::Map<String, Value>) {
    match result {
        Value::Object(res_map) if res_map.contains_key("scenarios") => {
            print_exit_scenarios(res_map);
        }
        Value::Object(res_map) if res_map.contains_key("payouts") => {
            print_distribution(res_map);
        }
        Value::Object(res_map) => {
            let mut builder = Builder::default();
            builder.push_record(["Field", "Value"]);
            for (key, val) in res_map {
                builder.push_record([key.as_str(), &format_value(val)]);
            }
            println!("{}", Table::from(builder));
        }
        _ => print_flat_object(&Value::Object(envelope.clone())),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// Single-exit distribution: one row per share class, then the totals.
fn print_distribution(res_map: &serde_json::Map<String, Value>) {
    let converted = string_set(res_map.get("converted_classes"));
    let capped = string_set(res_map.get("capped_classes"));

    if let Some(Value::Object(payouts)) = res_map.get("payouts") {
        let mut builder = Builder::default();
        builder.push_record(["Share Class", "Payout", "Converted", "Capped"]);
        for (name, amount) in payouts {
            builder.push_record([
                name.as_str(),
                &format_value(amount),
                flag(converted.contains(name.as_str())),
                flag(capped.contains(name.as_str())),
            ]);
        }
        println!("{}", Table::from(builder));
    }

    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for key in ["exit_value", "total_distributed"] {
        if let Some(val) = res_map.get(key) {
            builder.push_record([key, &format_value(val)]);
        }
    }
    println!("{}", Table::from(builder));
}

/// Multi-exit analysis: one class table per exit scenario.
fn print_exit_scenarios(res_map: &serde_json::Map<String, Value>) {
    let Some(Value::Array(scenarios)) = res_map.get("scenarios") else {
        return;
    };

    for scenario in scenarios {
        let Value::Object(map) = scenario else {
            continue;
        };
        if let Some(exit) = map.get("exit_value") {
            println!("Exit value: {}", format_value(exit));
        }
        if let Some(Value::Array(classes)) = map.get("classes") {
            print_array_table(classes);
        }
        if let Some(total) = map.get("total_distributed") {
            println!("Total distributed: {}", format_value(total));
        }
        println!();
    }
}

fn print_flat_object(value: &Value) {
    if let Value::Object(map) = value {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        for (key, val) in map {
            builder.push_record([key.as_str(), &format_value(val)]);
        }
        println!("{}", Table::from(builder));
    }
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| {
                        map.get(h.as_str())
                            .map(|v| format_value(v))
                            .unwrap_or_default()
                    })
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn string_set(value: Option<&Value>) -> std::collections::BTreeSet<&str> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| v.as_str()).collect(),
        _ => Default::default(),
    }
}

fn flag(set: bool) -> &'static str {
    if set { "yes" } else { "" }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(|v| format_value(v)).collect();
            items.join(", ")
        }
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
