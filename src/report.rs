//! Evaluation output: a JSON run report and precision-recall samples for plotting.

use crate::error::Result;
use crate::eval::{EvaluationReport, EvaluatorOptions};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Inputs and settings of a run, recorded next to its results.
#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    pub generated_at: DateTime<Utc>,
    pub features_path: PathBuf,
    pub features_sha256: String,
    pub annotation_path: PathBuf,
    pub annotation_sha256: String,
    pub distance_function: String,
    pub options: EvaluatorOptions,
}

impl RunInfo {
    /// Describe a run, fingerprinting both input files.
    pub fn new(
        features_path: &Path,
        annotation_path: &Path,
        distance_function: &str,
        options: EvaluatorOptions,
    ) -> Result<Self> {
        Ok(Self {
            generated_at: Utc::now(),
            features_path: features_path.to_path_buf(),
            features_sha256: compute_file_hash(features_path)?,
            annotation_path: annotation_path.to_path_buf(),
            annotation_sha256: compute_file_hash(annotation_path)?,
            distance_function: distance_function.to_string(),
            options,
        })
    }
}

#[derive(Serialize)]
struct RunReport<'a> {
    run: &'a RunInfo,
    #[serde(flatten)]
    results: &'a EvaluationReport,
}

/// Compute SHA256 hash of file contents
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    let hash = hasher.finalize();
    Ok(format!("{:x}", hash))
}

/// Write the run description and all results as pretty-printed JSON.
pub fn write_json(report: &EvaluationReport, run: &RunInfo, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(
        &mut writer,
        &RunReport {
            run,
            results: report,
        },
    )?;
    writer.flush()?;
    log::info!("Report written to {}", path.display());
    Ok(())
}

/// Write `query_id;position;precision;recall` rows, positions 1-based.
///
/// Queries evaluated without sample collection contribute no rows.
pub fn write_precision_recall_csv(report: &EvaluationReport, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_precision_recall(report, &mut writer)?;
    writer.flush()?;
    log::info!("Precision-recall samples written to {}", path.display());
    Ok(())
}

fn write_precision_recall(report: &EvaluationReport, out: &mut impl Write) -> Result<()> {
    writeln!(out, "query_id;position;precision;recall")?;
    for query in &report.queries {
        for (position, sample) in query.precision_recall.iter().enumerate() {
            writeln!(
                out,
                "{};{};{};{}",
                query.query_id,
                position + 1,
                sample.precision,
                sample.recall
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::{PrecisionRecall, QueryResult};
    use std::fs;
    use tempfile::TempDir;

    fn sample_report() -> EvaluationReport {
        EvaluationReport {
            mean_average_precision: 0.75,
            queries: vec![
                QueryResult {
                    query_id: 0,
                    class_id: 3,
                    average_precision: 1.0,
                    precision_recall: vec![
                        PrecisionRecall {
                            precision: 1.0,
                            recall: 1.0,
                        },
                        PrecisionRecall {
                            precision: 0.5,
                            recall: 1.0,
                        },
                    ],
                },
                QueryResult {
                    query_id: 4,
                    class_id: 1,
                    average_precision: 0.5,
                    precision_recall: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_compute_file_hash() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.txt");
        fs::write(&path, "abc").unwrap();
        assert_eq!(
            compute_file_hash(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_precision_recall_rows() {
        let mut out = Vec::new();
        write_precision_recall(&sample_report(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec!["query_id;position;precision;recall", "0;1;1;1", "0;2;0.5;1"]
        );
    }

    #[test]
    fn test_write_json_report() {
        let temp_dir = TempDir::new().unwrap();
        let features = temp_dir.path().join("features.json");
        let annotation = temp_dir.path().join("annotation.csv");
        fs::write(&features, "{}").unwrap();
        fs::write(&annotation, "0;1;1;1\n").unwrap();

        let run = RunInfo::new(&features, &annotation, "l2sqr", EvaluatorOptions::default())
            .unwrap();
        let path = temp_dir.path().join("report.json");
        write_json(&sample_report(), &run, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["mean_average_precision"], 0.75);
        assert_eq!(value["run"]["distance_function"], "l2sqr");
        assert_eq!(value["run"]["options"]["top_k"], 0);
        assert_eq!(value["queries"][0]["precision_recall"][1]["precision"], 0.5);
        assert!(value["queries"][1].get("precision_recall").is_none());
        assert_eq!(value["run"]["features_sha256"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_run_info_missing_input() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.xml");
        let result = RunInfo::new(&missing, &missing, "l2", EvaluatorOptions::default());
        assert!(result.is_err());
    }
}
