use serde_json::Value;

/// Resolve a dotted field path against a source record.
///
/// Kismet mixes layouts: keys may be stored flat (`"dot11.device.last_bssid"` at the top level),
/// fully nested, or as a branch keyed by a prefix whose children carry their full dotted name
/// (`"dot11.device" -> {"dot11.device.last_bssid": ..}`). All three resolve here. Missing keys,
/// non-object intermediates and `null` leaves are all `None`.
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let segments: Vec<&str> = path.split('.').collect();
    walk(record, &segments, 0).filter(|v| !v.is_null())
}

/// True when `path` resolves to a non-null value.
pub fn contains(record: &Value, path: &str) -> bool {
    lookup(record, path).is_some()
}

fn walk<'a>(node: &'a Value, segments: &[&str], consumed: usize) -> Option<&'a Value> {
    let map = node.as_object()?;
    let remaining = &segments[consumed..];

    // Longest key first so a flat key wins over a partial nested match
    for take in (1..=remaining.len()).rev() {
        let relative = remaining[..take].join(".");
        let mut candidates = vec![relative];
        if consumed > 0 {
            candidates.push(segments[..consumed + take].join("."));
        }

        for key in &candidates {
            let Some(child) = map.get(key.as_str()) else {
                continue;
            };
            if consumed + take == segments.len() {
                return Some(child);
            }
            if let Some(found) = walk(child, segments, consumed + take) {
                return Some(found);
            }
        }
    }
    None
}
