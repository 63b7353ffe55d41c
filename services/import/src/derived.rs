//! Import-time enrichment of QoS records.
//!
//! Packet-loss ratios are computed from the raw counters and grafted onto
//! the record before flattening, so they participate in column/value pairing
//! like any exported field.

use serde_json::Value;

/// Field the computed ratios are grouped under.
pub const DERIVED_KEY: &str = "derived";

/// Attach packet-loss ratios to a client or server QoS record.
///
/// `p_loss_rcvd` is `qosItems.PLL / qosItems.PR`; `p_loss_sent` is
/// `qosItems.PLR / qosItems.PS`. A ratio is attached only when both counters
/// are present and non-zero and the denominator is positive. Otherwise the
/// field is left out of the record entirely and flattening never sees it;
/// a missing ratio is absent, not zero and not NULL.
pub fn add_loss_ratios(record: &mut Value) {
    let mut derived = serde_json::Map::new();
    if let Some(items) = record.get("qosItems") {
        if let Some(ratio) = guarded_ratio(items.get("PLL"), items.get("PR")) {
            derived.insert("p_loss_rcvd".to_string(), Value::from(ratio));
        }
        if let Some(ratio) = guarded_ratio(items.get("PLR"), items.get("PS")) {
            derived.insert("p_loss_sent".to_string(), Value::from(ratio));
        }
    }
    if let Some(map) = record.as_object_mut() {
        map.insert(DERIVED_KEY.to_string(), Value::Object(derived));
    }
}

fn guarded_ratio(numerator: Option<&Value>, denominator: Option<&Value>) -> Option<f64> {
    let num = numerator?.as_f64()?;
    let den = denominator?.as_f64()?;
    if num != 0.0 && den > 0.0 {
        Some(num / den)
    } else {
        None
    }
}
