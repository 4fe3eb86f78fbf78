// src/utils/report.rs

use crate::chemenv::connectivity::{ConnectedComponent, LinkRecord};
use crate::error::AnalysisWarning;
use crate::pipeline::{PipelineResult, SiteLabel};
use serde::Serialize;

/// Plain-text report printed after a successful run
pub fn text_report(result: &PipelineResult, filename: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("File: {}\n", filename));
    out.push_str(&format!("Title: {}\n", result.structure_title));
    out.push_str(&format!("Formula: {}\n", result.formula));
    out.push_str(&format!(
        "Sites: {} ({} excluded)\n",
        result.site_count, result.excluded_site_count
    ));
    out.push_str(&format!("Strategy: {}\n", result.strategy));
    out.push_str("--------------------------------------------------\n");
    out.push_str(&format!(
        "{:<8} {:<8} {:<10} {:<10}\n",
        "Index", "Element", "Env", "Fraction"
    ));
    out.push_str("--------------------------------------------------\n");

    for l in &result.per_site_environment_labels {
        let fraction = l
            .confidence
            .map(|c| format!("{:.3}", c))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "{:<8} {:<8} {:<10} {:<10}\n",
            l.site_index, l.species, l.label, fraction
        ));
    }

    if let Some(sc) = &result.connectivity_graph {
        out.push_str("\nConnectivity:\n");
        for link in sc.links() {
            out.push_str(&format!(
                "  {} - {} {} ({} shared, image {:?})\n",
                link.from_site, link.to_site, link.link.kind, link.link.shared_ligands, link.link.image
            ));
        }
        for (i, c) in sc.components.iter().enumerate() {
            out.push_str(&format!(
                "  component {}: sites {:?}, {}D\n",
                i, c.sites, c.dimensionality
            ));
        }
    }

    if !result.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for w in &result.warnings {
            out.push_str(&format!("  WARNING {}\n", w));
        }
    }

    out
}

#[derive(Serialize)]
struct JsonConnectivity {
    links: Vec<LinkRecord>,
    components: Vec<ConnectedComponent>,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    file: &'a str,
    title: &'a str,
    formula: &'a str,
    site_count: usize,
    excluded_site_count: usize,
    strategy: &'a str,
    per_site_environment_labels: &'a [SiteLabel],
    connectivity: Option<JsonConnectivity>,
    warnings: &'a [AnalysisWarning],
}

pub fn json_report(result: &PipelineResult, filename: &str) -> serde_json::Result<String> {
    let report = JsonReport {
        file: filename,
        title: &result.structure_title,
        formula: &result.formula,
        site_count: result.site_count,
        excluded_site_count: result.excluded_site_count,
        strategy: &result.strategy,
        per_site_environment_labels: &result.per_site_environment_labels,
        connectivity: result.connectivity_graph.as_ref().map(|sc| JsonConnectivity {
            links: sc.links(),
            components: sc.components.clone(),
        }),
        warnings: &result.warnings,
    };
    serde_json::to_string_pretty(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;

    fn sample() -> PipelineResult {
        PipelineResult {
            structure_title: "NaCl".into(),
            formula: "Cl4 Na4".into(),
            site_count: 8,
            excluded_site_count: 4,
            strategy: "simple(1.4, 0.3)".into(),
            per_site_environment_labels: vec![SiteLabel {
                site_index: 0,
                species: "Na".into(),
                label: "C:12".into(),
                confidence: Some(0.75),
            }],
            connectivity_graph: None,
            warnings: vec![AnalysisWarning::new(
                Stage::Connectivity,
                "connectivity graph unavailable: no site environment matches the filter [T]",
            )],
        }
    }

    #[test]
    fn test_text_report_lists_labels_and_warnings() {
        let text = text_report(&sample(), "CONTCAR_000");
        assert!(text.contains("Formula: Cl4 Na4"));
        assert!(text.contains("C:12"));
        assert!(text.contains("0.750"));
        assert!(text.contains("WARNING [connectivity] connectivity graph unavailable"));
        assert!(!text.contains("Connectivity:"));
    }

    #[test]
    fn test_json_report_shape() {
        let json = json_report(&sample(), "CONTCAR_000").unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["site_count"], 8);
        assert_eq!(v["per_site_environment_labels"][0]["label"], "C:12");
        assert!(v["connectivity"].is_null());
        assert_eq!(v["warnings"][0]["stage"], "connectivity");
    }
}
