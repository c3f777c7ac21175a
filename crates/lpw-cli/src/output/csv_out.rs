use serde_json::Value;
use std::io;

/// Write output as CSV to stdout.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => {
            let result = map.get("result").unwrap_or(value);
            match result {
                Value::Object(res_map) if res_map.contains_key("scenarios") => {
                    write_scenarios_csv(&mut wtr, res_map);
                }
                Value::Object(res_map) if res_map.contains_key("payouts") => {
                    write_payouts_csv(&mut wtr, res_map);
                }
                Value::Object(res_map) => {
                    let _ = wtr.write_record(["field", "value"]);
                    for (key, val) in res_map {
                        let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
                    }
                }
                _ => {
                    let _ = wtr.write_record(["field", "value"]);
                    for (key, val) in map {
                        let _ = wtr.write_record([key.as_str(), &format_csv_value(val)]);
                    }
                }
            }
        }
        Value::Array(arr) => {
            write_array_csv(&mut wtr, arr);
        }
        _ => {
            let _ = wtr.write_record([&format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

fn write_payouts_csv(wtr: &mut csv::Writer<io::StdoutLock<'_>>, res_map: &serde_json::Map<String, Value>) {
    let Some(Value::Object(payouts)) = res_map.get("payouts") else {
        return;
    };
    let _ = wtr.write_record(["share_class", "payout"]);
    for (name, amount) in payouts {
        let _ = wtr.write_record([name.as_str(), &format_csv_value(amount)]);
    }
}

/// One row per (exit, class) pair so the analysis flattens cleanly.
fn write_scenarios_csv(wtr: &mut csv::Writer<io::StdoutLock<'_>>, res_map: &serde_json::Map<String, Value>) {
    let Some(Value::Array(scenarios)) = res_map.get("scenarios") else {
        return;
    };

    let mut headers_written = false;
    for scenario in scenarios {
        let Value::Object(map) = scenario else {
            continue;
        };
        let exit = map
            .get("exit_value")
            .map(|v| format_csv_value(v))
            .unwrap_or_default();
        let Some(Value::Array(classes)) = map.get("classes") else {
            continue;
        };

        for class in classes {
            if let Value::Object(fields) = class {
                if !headers_written {
                    let mut headers = vec!["exit_value".to_string()];
                    headers.extend(fields.keys().cloned());
                    let _ = wtr.write_record(&headers);
                    headers_written = true;
                }
                let mut row = vec![exit.clone()];
                row.extend(fields.values().map(|v| format_csv_value(v)));
                let _ = wtr.write_record(&row);
            }
        }
    }
}

fn write_array_csv(wtr: &mut csv::Writer<io::StdoutLock<'_>>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| {
                        map.get(*h)
                            .map(|v| format_csv_value(v))
                            .unwrap_or_default()
                    })
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
