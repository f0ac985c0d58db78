use serde_json::{Map, Value};

pub fn get_path<'a>(root: &'a Value, dotted: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in dotted.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Writes `value` at `dotted`, replacing any scalar that sits where an object is needed.
pub fn set_path(root: &mut Map<String, Value>, dotted: &str, value: Value) {
    let mut current = root;
    let mut segments = dotted.split('.').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let slot = current
            .entry(segment)
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
}

/// Interprets a raw env/CLI string as a JSON scalar when it looks like one.
pub fn coerce_scalar(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() && raw.contains('.') {
            return Value::from(f);
        }
    }
    Value::String(raw.to_string())
}

pub fn merge_object(dst: &mut Map<String, Value>, src: Map<String, Value>) {
    for (key, value) in src {
        match (dst.get_mut(&key), value) {
            (Some(Value::Object(dst_obj)), Value::Object(src_obj)) => {
                merge_object(dst_obj, src_obj);
            }
            (_, v) => {
                dst.insert(key, v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_path_builds_and_overwrites() {
        let mut map = Map::new();
        set_path(&mut map, "store.url", json!("http://a"));
        set_path(&mut map, "store", json!("flat"));
        set_path(&mut map, "store.url", json!("http://b"));
        assert_eq!(Value::Object(map), json!({"store": {"url": "http://b"}}));
    }

    #[test]
    fn coerces_scalars() {
        assert_eq!(coerce_scalar("12"), json!(12));
        assert_eq!(coerce_scalar("true"), json!(true));
        assert_eq!(coerce_scalar("0.5"), json!(0.5));
        assert_eq!(coerce_scalar("30s"), json!("30s"));
        assert_eq!(coerce_scalar("1e3"), json!("1e3"));
    }
}
