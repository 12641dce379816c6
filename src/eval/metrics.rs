//! Confusion counts and derived metrics for query evaluation.
//!
//! Two granularities share one shape: query-level (did the generated query
//! reproduce the reference result set exactly) and item-level (per-row set
//! overlap between the two result sets). Counts accumulate overall and per
//! question type; derived metrics treat every zero denominator as 0.0 so a
//! type with no positives reports zeros instead of NaN.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::graph::ResultSet;
use crate::verify::Verdict;

/// Raw confusion counts.
///
/// `true_negatives` exists for formula parity but is never incremented:
/// neither granularity has a negative class to confirm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub true_positives: usize,
    pub false_negatives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
}

impl Counts {
    pub fn support(&self) -> usize {
        self.true_positives + self.false_negatives + self.false_positives + self.true_negatives
    }

    fn pairs(&self) -> [(&'static str, usize); 4] {
        [
            ("TP", self.true_positives),
            ("FN", self.false_negatives),
            ("FP", self.false_positives),
            ("TN", self.true_negatives),
        ]
    }
}

/// Metrics derived from one [`Counts`]; zero denominators yield 0.0.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Metrics {
    pub support: usize,
    pub accuracy: f64,
    pub error_rate: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub false_negative_rate: f64,
    pub false_positive_rate: f64,
}

impl Metrics {
    pub fn from_counts(c: Counts) -> Self {
        let support = c.support();
        let predicted_positive = c.true_positives + c.false_positives;
        let actual_positive = c.true_positives + c.false_negatives;

        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };

        let accuracy = ratio(c.true_positives + c.true_negatives, support);
        let error_rate = if support > 0 { 1.0 - accuracy } else { 0.0 };
        let precision = ratio(c.true_positives, predicted_positive);
        let recall = ratio(c.true_positives, actual_positive);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            support,
            accuracy,
            error_rate,
            precision,
            recall,
            f1_score,
            false_negative_rate: ratio(c.false_negatives, actual_positive),
            false_positive_rate: ratio(c.false_positives, predicted_positive),
        }
    }

    fn pairs(&self) -> [(&'static str, f64); 8] {
        [
            ("support", self.support as f64),
            ("accuracy", self.accuracy),
            ("error_rate", self.error_rate),
            ("precision", self.precision),
            ("recall", self.recall),
            ("f1_score", self.f1_score),
            ("false_negative_rate", self.false_negative_rate),
            ("false_positive_rate", self.false_positive_rate),
        ]
    }
}

/// Counts for one question type, both granularities.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TypeCounts {
    pub query: Counts,
    pub item: Counts,
}

/// Accumulated evaluation results.
///
/// `judged + skipped` equals the number of examples seen. Skipped examples
/// (missing generated query, or a reference that would not execute) still
/// count as query-level false negatives so headline accuracy reflects them,
/// but contribute no item-level counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvalReport {
    pub overall_query: Counts,
    pub overall_item: Counts,
    pub per_type: BTreeMap<String, TypeCounts>,
    pub judged: usize,
    pub skipped: usize,
}

impl EvalReport {
    /// Fold in one compared example.
    pub fn record(&mut self, question_type: &str, verdict: &Verdict) {
        self.judged += 1;
        let entry = self.per_type.entry(question_type.to_string()).or_default();

        if verdict.equivalent {
            self.overall_query.true_positives += 1;
            entry.query.true_positives += 1;
        } else {
            self.overall_query.false_negatives += 1;
            entry.query.false_negatives += 1;
        }

        let reference = verdict.reference.row_set();
        match &verdict.generated {
            Some(rows) => {
                let generated = rows.row_set();
                let tp = generated.intersection(&reference).count();
                let fn_items = reference.difference(&generated).count();
                let fp_items = generated.difference(&reference).count();

                self.overall_item.true_positives += tp;
                self.overall_item.false_negatives += fn_items;
                self.overall_item.false_positives += fp_items;
                entry.item.true_positives += tp;
                entry.item.false_negatives += fn_items;
                entry.item.false_positives += fp_items;
            }
            None => {
                // The generated query never ran, so every reference row is missed.
                self.overall_item.false_negatives += reference.len();
                entry.item.false_negatives += reference.len();
            }
        }
    }

    /// Fold in an example whose query generation failed outright.
    pub fn record_generation_failure(&mut self, question_type: &str, reference: &ResultSet) {
        self.judged += 1;
        let entry = self.per_type.entry(question_type.to_string()).or_default();
        self.overall_query.false_negatives += 1;
        entry.query.false_negatives += 1;
        let missed = reference.row_set().len();
        self.overall_item.false_negatives += missed;
        entry.item.false_negatives += missed;
    }

    /// Fold in an example that cannot be scored at all.
    pub fn record_unjudgeable(&mut self, question_type: &str) {
        self.skipped += 1;
        let entry = self.per_type.entry(question_type.to_string()).or_default();
        self.overall_query.false_negatives += 1;
        entry.query.false_negatives += 1;
    }

    pub fn query_metrics(&self) -> Metrics {
        Metrics::from_counts(self.overall_query)
    }

    pub fn item_metrics(&self) -> Metrics {
        Metrics::from_counts(self.overall_item)
    }

    /// Item counts averaged over the query-level support.
    fn average_items(query: Counts, item: Counts) -> [(&'static str, f64); 4] {
        let valid = query.support();
        let avg = |n: usize| if valid > 0 { n as f64 / valid as f64 } else { 0.0 };
        [
            ("TP", avg(item.true_positives)),
            ("FN", avg(item.false_negatives)),
            ("FP", avg(item.false_positives)),
            ("TN", avg(item.true_negatives)),
        ]
    }

    /// The report as CSV rows: `Section,Question Type,Metric Category,Metric,Value`.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_row(
            &mut out,
            ["Section", "Question Type", "Metric Category", "Metric", "Value"],
        );

        for (qtype, counts) in &self.per_type {
            for (metric, value) in counts.query.pairs() {
                push_row(
                    &mut out,
                    [
                        "Per Question Type Analysis",
                        qtype,
                        "Query-Level Counts",
                        metric,
                        &value.to_string(),
                    ],
                );
            }
            for (metric, value) in Metrics::from_counts(counts.query).pairs() {
                push_row(
                    &mut out,
                    [
                        "Per Question Type Analysis",
                        qtype,
                        "Query-Level Metrics",
                        metric,
                        &format!("{value:.4}"),
                    ],
                );
            }
            for (metric, value) in counts.item.pairs() {
                push_row(
                    &mut out,
                    [
                        "Per Question Type Analysis",
                        qtype,
                        "Item-Level Counts",
                        metric,
                        &value.to_string(),
                    ],
                );
            }
            for (metric, value) in Metrics::from_counts(counts.item).pairs() {
                push_row(
                    &mut out,
                    [
                        "Per Question Type Analysis",
                        qtype,
                        "Item-Level Metrics",
                        metric,
                        &format!("{value:.4}"),
                    ],
                );
            }
            for (metric, value) in Self::average_items(counts.query, counts.item) {
                push_row(
                    &mut out,
                    [
                        "Per Question Type Analysis",
                        qtype,
                        "Average Item-Level Counts per Query",
                        metric,
                        &format!("{value:.4}"),
                    ],
                );
            }
        }

        for (metric, value) in self.overall_query.pairs() {
            push_row(
                &mut out,
                [
                    "Overall Analysis",
                    "Overall Query-Level Counts",
                    "Counts",
                    metric,
                    &value.to_string(),
                ],
            );
        }
        for (metric, value) in self.query_metrics().pairs() {
            push_row(
                &mut out,
                [
                    "Overall Analysis",
                    "Overall Query-Level Metrics",
                    "Metrics",
                    metric,
                    &format!("{value:.4}"),
                ],
            );
        }
        for (metric, value) in self.overall_item.pairs() {
            push_row(
                &mut out,
                [
                    "Overall Analysis",
                    "Overall Item-Level Counts",
                    "Counts",
                    metric,
                    &value.to_string(),
                ],
            );
        }
        for (metric, value) in self.item_metrics().pairs() {
            push_row(
                &mut out,
                [
                    "Overall Analysis",
                    "Overall Item-Level Metrics",
                    "Metrics",
                    metric,
                    &format!("{value:.4}"),
                ],
            );
        }
        for (metric, value) in Self::average_items(self.overall_query, self.overall_item) {
            push_row(
                &mut out,
                [
                    "Overall Analysis",
                    "Overall Average Item-Level Counts per Query",
                    "Counts",
                    metric,
                    &format!("{value:.4}"),
                ],
            );
        }

        out
    }

    /// The report with derived metrics as a JSON document.
    pub fn to_json(&self) -> serde_json::Value {
        let per_type: serde_json::Map<String, serde_json::Value> = self
            .per_type
            .iter()
            .map(|(qtype, counts)| {
                (
                    qtype.clone(),
                    serde_json::json!({
                        "query_level_counts": counts.query,
                        "query_level_metrics": Metrics::from_counts(counts.query),
                        "item_level_counts": counts.item,
                        "item_level_metrics": Metrics::from_counts(counts.item),
                    }),
                )
            })
            .collect();

        serde_json::json!({
            "judged": self.judged,
            "skipped": self.skipped,
            "overall_query_counts": self.overall_query,
            "overall_query_metrics": self.query_metrics(),
            "overall_item_counts": self.overall_item,
            "overall_item_metrics": self.item_metrics(),
            "per_type": per_type,
        })
    }
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = self.query_metrics();
        let i = self.item_metrics();
        writeln!(
            f,
            "evaluated {} examples ({} skipped)",
            self.judged + self.skipped,
            self.skipped
        )?;
        writeln!(
            f,
            "query level: accuracy {:.4} | precision {:.4} | recall {:.4} | f1 {:.4}",
            q.accuracy, q.precision, q.recall, q.f1_score
        )?;
        writeln!(
            f,
            "item level:  accuracy {:.4} | precision {:.4} | recall {:.4} | f1 {:.4}",
            i.accuracy, i.precision, i.recall, i.f1_score
        )?;
        if !self.per_type.is_empty() {
            writeln!(f, "per question type:")?;
            for (qtype, counts) in &self.per_type {
                let qm = Metrics::from_counts(counts.query);
                let im = Metrics::from_counts(counts.item);
                writeln!(
                    f,
                    "  {:<24} query f1 {:.4} | item f1 {:.4} (n={})",
                    qtype,
                    qm.f1_score,
                    im.f1_score,
                    counts.query.support()
                )?;
            }
        }
        Ok(())
    }
}

fn push_row(out: &mut String, cols: [&str; 5]) {
    let escaped: Vec<String> = cols.iter().map(|c| csv_field(c)).collect();
    out.push_str(&escaped.join(","));
    out.push('\n');
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
