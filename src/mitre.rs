//! # MITRE ATT&CK Annotation
//! Maps normalized alert types to an ATT&CK tactic and technique id for
//! the investigation panel. Lookup is tolerant of feed spelling ("Brute
//! Force", "brute-force" and "BRUTE_FORCE" all resolve the same way);
//! unknown types fall back to ("Unknown", "N/A").

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Tactic + technique pair shown next to an alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MitreAnnotation {
    pub tactic: &'static str,
    pub technique: &'static str,
}

const UNKNOWN: MitreAnnotation = MitreAnnotation {
    tactic: "Unknown",
    technique: "N/A",
};

static MITRE_MAP: Lazy<HashMap<&'static str, MitreAnnotation>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for (alert_type, tactic, technique) in [
        ("PRIV_ESC", "Privilege Escalation", "T1068"),
        ("BRUTE_FORCE", "Credential Access", "T1110"),
        ("LATERAL_MOVE", "Lateral Movement", "T1021"),
        ("DATA_EXFIL", "Exfiltration", "T1041"),
        ("MALWARE_EXEC", "Execution", "T1059"),
        ("PORT_SCAN", "Discovery", "T1046"),
        ("AUTH_FAILURE", "Credential Access", "T1110"),
    ] {
        m.insert(alert_type, MitreAnnotation { tactic, technique });
    }
    m
});

static NON_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Z0-9]+").expect("mitre: normalize regex"));

/// Normalize a feed-supplied alert type: uppercase, runs of anything
/// non-alphanumeric collapsed to a single `_`.
pub fn normalize_alert_type(raw: &str) -> String {
    let upper = raw.trim().to_ascii_uppercase();
    let collapsed = NON_ALNUM.replace_all(&upper, "_");
    collapsed.trim_matches('_').to_string()
}

/// Resolve an alert type to its ATT&CK annotation.
pub fn annotate(alert_type: &str) -> MitreAnnotation {
    MITRE_MAP
        .get(normalize_alert_type(alert_type).as_str())
        .cloned()
        .unwrap_or(UNKNOWN)
}
