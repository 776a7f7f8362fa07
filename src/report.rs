//! Report tables over the record index: the per-configuration IPC table
//! with its GEOMETRIC MEAN footer, the baseline-normalized pinning-effect
//! summary, and the RBMPKI ranking.
//!
//! Missing cells render as `N/A`; a degenerate geometric mean (no data)
//! renders as `N/A` as well, never as `0.0000`.

use crate::coord::PageSize;
use crate::index::{CoordinateFilter, Record, RecordIndex};
use crate::stats::{
    MemoryIntensity, geometric_mean, geometric_mean_opt, percent_delta, pin_gain,
    rank_descending, ratio_to_baseline,
};
use serde::Serialize;

/// IPC per workload and configuration, for one page size and capacity.
///
/// Columns are `baseline` followed by each error rate present in the data
/// (with a `<rate>_pin` variant wherever pinned runs exist). Cells hold the
/// configuration IPC or nothing.
#[derive(Debug, Clone, Serialize)]
pub struct IpcTable {
    pub page: String,
    pub capacity: String,
    pub columns: Vec<String>,
    pub rows: Vec<IpcRow>,
    /// Per-column geometric mean over present cells; `0.0` means no data.
    pub gmeans: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IpcRow {
    pub workload: String,
    pub cells: Vec<Option<f64>>,
}

/// Baseline-normalized pinning effect for one page size and error rate.
///
/// Ratios are per-workload IPC over the workload's baseline IPC; the gmean
/// runs over workloads with a usable pairing. `0.0` gmeans mean no data and
/// carry no percent delta.
#[derive(Debug, Clone, Serialize)]
pub struct PinningEffectRow {
    pub page: String,
    pub error_rate: String,
    pub nopin_vs_base_gmean: f64,
    pub pin_vs_base_gmean: f64,
    pub pin_over_nopin_gmean: f64,
    pub nopin_delta_pct: Option<f64>,
    pub pin_delta_pct: Option<f64>,
    pub pin_gain_pct: Option<f64>,
    pub nopin_samples: usize,
    pub pin_samples: usize,
    pub gain_samples: usize,
}

/// Mean error-way allocation and usage for one (LLC size, page size,
/// error rate) group of cache-pinning runs.
#[derive(Debug, Clone, Serialize)]
pub struct WayUsageRow {
    pub llc_size_mb: u32,
    pub page: String,
    pub error_rate: String,
    pub mean_alloc_ways: f64,
    pub mean_used_pct: f64,
    pub samples: usize,
}

/// One line of the RBMPKI ranking.
#[derive(Debug, Clone, Serialize)]
pub struct RbmpkiRow {
    pub workload: String,
    pub page: String,
    pub ipc: Option<f64>,
    pub rbmpki: f64,
    pub intensity: MemoryIntensity,
}

/// Everything the report subcommand emits, JSON-serializable as one bundle.
#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    pub records: usize,
    pub tables: Vec<IpcTable>,
    pub pinning: Vec<PinningEffectRow>,
    pub way_usage: Vec<WayUsageRow>,
    pub ranking: Vec<RbmpkiRow>,
}

pub fn build_report_data(index: &RecordIndex) -> ReportData {
    let mut tables = Vec::new();
    for page in [PageSize::Kb4, PageSize::Mb2] {
        for capacity in index.capacities() {
            let table = build_ipc_table(index, page, &capacity);
            if !table.rows.is_empty() {
                tables.push(table);
            }
        }
    }

    ReportData {
        records: index.len(),
        tables,
        pinning: build_pinning_effect(index),
        way_usage: build_way_usage(index),
        ranking: build_rbmpki_ranking(&index.by_coordinate(&CoordinateFilter::any())),
    }
}

/// Build the IPC table for one page size and capacity. Workloads without a
/// single record in that slice are omitted; a workload missing one
/// configuration keeps an empty cell there.
pub fn build_ipc_table(index: &RecordIndex, page: PageSize, capacity: &str) -> IpcTable {
    let scoped = CoordinateFilter::any().page(page).capacity(capacity);

    // Column set: baseline first, then rates in sorted order, pinned
    // variants only where pinned runs actually exist.
    let mut columns = vec!["baseline".to_string()];
    for rate in index.error_rates() {
        let has_nopin = !index
            .by_coordinate(&scoped.clone().rate(&rate).pinning(false))
            .is_empty();
        let has_pin = !index
            .by_coordinate(&scoped.clone().rate(&rate).pinning(true))
            .is_empty();
        if has_nopin {
            columns.push(rate.clone());
        }
        if has_pin {
            columns.push(format!("{rate}_pin"));
        }
    }

    let mut rows = Vec::new();
    for workload in index.workloads() {
        let per_workload = scoped.clone().workload(&workload);
        if index.by_coordinate(&per_workload).is_empty() {
            continue;
        }

        let cells: Vec<Option<f64>> = columns
            .iter()
            .map(|column| {
                let filter = column_filter(per_workload.clone(), column);
                cell_ipc(index, &filter)
            })
            .collect();

        rows.push(IpcRow { workload, cells });
    }

    let gmeans = (0..columns.len())
        .map(|i| geometric_mean_opt(rows.iter().map(|r| r.cells[i])))
        .collect();

    IpcTable {
        page: page.as_str().to_string(),
        capacity: capacity.to_string(),
        columns,
        rows,
        gmeans,
    }
}

fn column_filter(base: CoordinateFilter, column: &str) -> CoordinateFilter {
    if column == "baseline" {
        base.baseline()
    } else if let Some(rate) = column.strip_suffix("_pin") {
        base.rate(rate).pinning(true)
    } else {
        base.rate(column).pinning(false)
    }
}

/// IPC of the record matching the filter; with duplicates across unset
/// dimensions the last inserted record wins.
fn cell_ipc(index: &RecordIndex, filter: &CoordinateFilter) -> Option<f64> {
    index
        .by_coordinate(filter)
        .last()
        .and_then(|r| r.metrics.ipc)
}

/// One row per (page size, error rate) with pinned/unpinned gmeans over
/// baseline-normalized ratios. Pairings without a positive baseline, and
/// gain pairings missing either side, are excluded rather than zeroed.
pub fn build_pinning_effect(index: &RecordIndex) -> Vec<PinningEffectRow> {
    let mut out = Vec::new();

    for page in [PageSize::Kb4, PageSize::Mb2] {
        for rate in index.error_rates() {
            let mut nopin_ratios = Vec::new();
            let mut pin_ratios = Vec::new();
            let mut gains = Vec::new();

            for workload in index.workloads() {
                let base = index.baseline_for(&workload, page).and_then(|m| m.ipc);
                let scoped = CoordinateFilter::any()
                    .page(page)
                    .workload(&workload)
                    .rate(&rate);
                let nopin = cell_ipc(index, &scoped.clone().pinning(false));
                let pin = cell_ipc(index, &scoped.clone().pinning(true));

                if let Some(ratio) = ratio_to_baseline(base, nopin) {
                    nopin_ratios.push(ratio);
                }
                if let Some(ratio) = ratio_to_baseline(base, pin) {
                    pin_ratios.push(ratio);
                }
                if let Some(gain) = pin_gain(nopin, pin) {
                    gains.push(gain);
                }
            }

            if nopin_ratios.is_empty() && pin_ratios.is_empty() && gains.is_empty() {
                continue;
            }

            let nopin_gmean = geometric_mean(nopin_ratios.iter().copied());
            let pin_gmean = geometric_mean(pin_ratios.iter().copied());
            let gain_gmean = geometric_mean(gains.iter().copied());

            out.push(PinningEffectRow {
                page: page.as_str().to_string(),
                error_rate: rate.clone(),
                nopin_vs_base_gmean: nopin_gmean,
                pin_vs_base_gmean: pin_gmean,
                pin_over_nopin_gmean: gain_gmean,
                nopin_delta_pct: delta_if_present(nopin_gmean),
                pin_delta_pct: delta_if_present(pin_gmean),
                pin_gain_pct: delta_if_present(gain_gmean),
                nopin_samples: nopin_ratios.len(),
                pin_samples: pin_ratios.len(),
                gain_samples: gains.len(),
            });
        }
    }

    out
}

fn delta_if_present(gmean: f64) -> Option<f64> {
    (gmean > 0.0).then(|| percent_delta(gmean))
}

/// Mean error-way allocation and usage over cache-pinning runs, grouped
/// by (LLC size, page size, error rate). A run enters its group only when
/// both way stats were extracted; groups with no usable run are omitted.
pub fn build_way_usage(index: &RecordIndex) -> Vec<WayUsageRow> {
    let mut out = Vec::new();

    for llc in index.llc_sizes() {
        for page in [PageSize::Kb4, PageSize::Mb2] {
            for rate in index.error_rates() {
                let filter = CoordinateFilter::any()
                    .llc(llc)
                    .page(page)
                    .rate(&rate)
                    .pinning(true);

                let stats: Vec<(u32, f64)> = index
                    .by_coordinate(&filter)
                    .iter()
                    .filter_map(|r| {
                        match (r.metrics.alloc_error_ways, r.metrics.used_way_pct) {
                            (Some(alloc), Some(used)) => Some((alloc, used)),
                            _ => None,
                        }
                    })
                    .collect();

                if stats.is_empty() {
                    continue;
                }

                let n = stats.len() as f64;
                let mean_alloc_ways = stats.iter().map(|(a, _)| *a as f64).sum::<f64>() / n;
                let mean_used_pct = stats.iter().map(|(_, u)| *u).sum::<f64>() / n;

                out.push(WayUsageRow {
                    llc_size_mb: llc,
                    page: page.as_str().to_string(),
                    error_rate: rate.clone(),
                    mean_alloc_ways,
                    mean_used_pct,
                    samples: stats.len(),
                });
            }
        }
    }

    out
}

/// Rank records by RBMPKI, descending; records without an RBMPKI are left
/// out (their intensity would be Unknown anyway). Ties keep insertion
/// order.
pub fn build_rbmpki_ranking(records: &[&Record]) -> Vec<RbmpkiRow> {
    let with_rbmpki: Vec<&Record> = records
        .iter()
        .copied()
        .filter(|r| r.metrics.rbmpki.is_some())
        .collect();

    rank_descending(&with_rbmpki, |r| r.metrics.rbmpki.unwrap_or(0.0))
        .into_iter()
        .map(|r| {
            let rbmpki = r.metrics.rbmpki.unwrap_or(0.0);
            RbmpkiRow {
                workload: r.coordinate.workload.clone(),
                page: r.coordinate.page_size.as_str().to_string(),
                ipc: r.metrics.ipc,
                rbmpki,
                intensity: MemoryIntensity::from_rbmpki(Some(rbmpki)),
            }
        })
        .collect()
}

/// Render an IPC table as CSV: header, one row per workload, GEOMETRIC
/// MEAN footer.
pub fn render_ipc_csv(table: &IpcTable) -> String {
    let mut out = String::new();

    let mut header = vec!["Workload".to_string()];
    header.extend(table.columns.iter().cloned());
    push_csv_row(&mut out, &header);

    for row in &table.rows {
        let mut fields = vec![row.workload.clone()];
        fields.extend(row.cells.iter().map(|c| format_cell(*c)));
        push_csv_row(&mut out, &fields);
    }

    let mut footer = vec!["GEOMETRIC MEAN".to_string()];
    footer.extend(table.gmeans.iter().map(|g| format_gmean(*g)));
    push_csv_row(&mut out, &footer);

    out
}

/// Render the pinning-effect rows as CSV.
pub fn render_pinning_csv(rows: &[PinningEffectRow]) -> String {
    let mut out = String::new();
    push_csv_row(
        &mut out,
        &[
            "Page".to_string(),
            "Error_Rate".to_string(),
            "NoPin_vs_Base_GMEAN".to_string(),
            "Pin_vs_Base_GMEAN".to_string(),
            "Pin_over_NoPin_GMEAN".to_string(),
            "NoPin_Delta_%".to_string(),
            "Pin_Delta_%".to_string(),
            "Pin_Gain_%".to_string(),
            "NoPin_Samples".to_string(),
            "Pin_Samples".to_string(),
            "Gain_Samples".to_string(),
        ],
    );

    for row in rows {
        push_csv_row(
            &mut out,
            &[
                row.page.clone(),
                row.error_rate.clone(),
                format_gmean(row.nopin_vs_base_gmean),
                format_gmean(row.pin_vs_base_gmean),
                format_gmean(row.pin_over_nopin_gmean),
                format_pct(row.nopin_delta_pct),
                format_pct(row.pin_delta_pct),
                format_pct(row.pin_gain_pct),
                row.nopin_samples.to_string(),
                row.pin_samples.to_string(),
                row.gain_samples.to_string(),
            ],
        );
    }

    out
}

/// Render the way-usage rows as CSV.
pub fn render_way_usage_csv(rows: &[WayUsageRow]) -> String {
    let mut out = String::new();
    push_csv_row(
        &mut out,
        &[
            "LLC_MB".to_string(),
            "Page".to_string(),
            "MTBCE".to_string(),
            "AllocatedWays".to_string(),
            "UsedPct".to_string(),
            "Samples".to_string(),
        ],
    );

    for row in rows {
        push_csv_row(
            &mut out,
            &[
                row.llc_size_mb.to_string(),
                row.page.clone(),
                row.error_rate.clone(),
                format!("{:.2}", row.mean_alloc_ways),
                format!("{:.2}", row.mean_used_pct),
                row.samples.to_string(),
            ],
        );
    }

    out
}

/// Render the ranking as an aligned console table with a band-count
/// summary line.
pub fn render_ranking_text(rows: &[RbmpkiRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<20} {:<6} {:>10} {:>10}  {}\n",
        "Workload", "Page", "IPC", "RBMPKI", "Intensity"
    ));
    out.push_str(&"-".repeat(62));
    out.push('\n');

    let mut high = 0usize;
    let mut medium = 0usize;
    let mut low = 0usize;
    for row in rows {
        match row.intensity {
            MemoryIntensity::High => high += 1,
            MemoryIntensity::Medium => medium += 1,
            MemoryIntensity::Low => low += 1,
            MemoryIntensity::Unknown => {}
        }
        out.push_str(&format!(
            "{:<20} {:<6} {:>10} {:>10.2}  {}\n",
            row.workload,
            row.page,
            format_cell(row.ipc),
            row.rbmpki,
            row.intensity
        ));
    }

    out.push_str(&"-".repeat(62));
    out.push('\n');
    out.push_str(&format!(
        "High (>10): {high}, Medium (5-10): {medium}, Low (<=5): {low}\n"
    ));
    out
}

fn format_cell(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.4}"),
        None => "N/A".to_string(),
    }
}

fn format_gmean(gmean: f64) -> String {
    if gmean > 0.0 {
        format!("{gmean:.4}")
    } else {
        "N/A".to_string()
    }
}

fn format_pct(pct: Option<f64>) -> String {
    match pct {
        Some(v) => format!("{v:.2}"),
        None => "N/A".to_string(),
    }
}

fn push_csv_row(out: &mut String, fields: &[String]) {
    let escaped: Vec<String> = fields.iter().map(|f| escape_csv(f)).collect();
    out.push_str(&escaped.join(","));
    out.push('\n');
}

fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::ExperimentCoordinate;
    use crate::metrics::MetricSet;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn record(
        workload: &str,
        page: PageSize,
        rate: Option<&str>,
        pinning: bool,
        ipc: Option<f64>,
        rbmpki: Option<f64>,
    ) -> Record {
        Record {
            coordinate: ExperimentCoordinate {
                page_size: page,
                llc_size_mb: 2,
                capacity: "32gb".to_string(),
                error_rate: rate.map(str::to_string),
                pinning,
                workload: workload.to_string(),
                trace: workload.to_string(),
            },
            metrics: MetricSet {
                ipc,
                rbmpki,
                ..MetricSet::default()
            },
            source_path: PathBuf::from(format!("{workload}.txt")),
        }
    }

    fn sample_index() -> RecordIndex {
        let mut index = RecordIndex::new();
        index.insert(record("429.mcf", PageSize::Kb4, None, false, Some(1.0), None));
        index.insert(record("429.mcf", PageSize::Kb4, Some("1e-7"), false, Some(0.8), None));
        index.insert(record("429.mcf", PageSize::Kb4, Some("1e-7"), true, Some(0.9), None));
        index.insert(record("401.bzip2", PageSize::Kb4, None, false, Some(2.0), None));
        index.insert(record("401.bzip2", PageSize::Kb4, Some("1e-7"), false, Some(1.6), None));
        index
    }

    #[test]
    fn ipc_table_columns_and_gmeans() {
        let table = build_ipc_table(&sample_index(), PageSize::Kb4, "32gb");
        assert_eq!(table.columns, vec!["baseline", "1e-7", "1e-7_pin"]);
        assert_eq!(table.rows.len(), 2);

        // Rows are in sorted workload order.
        assert_eq!(table.rows[0].workload, "401.bzip2");
        assert_eq!(table.rows[0].cells, vec![Some(2.0), Some(1.6), None]);
        assert_eq!(table.rows[1].cells, vec![Some(1.0), Some(0.8), Some(0.9)]);

        // Baseline gmean = sqrt(1.0 * 2.0); pin column has one sample.
        assert!((table.gmeans[0] - 2.0f64.sqrt()).abs() < 1e-12);
        assert!((table.gmeans[2] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn ipc_csv_has_footer_and_na_cells() {
        let table = build_ipc_table(&sample_index(), PageSize::Kb4, "32gb");
        let csv = render_ipc_csv(&table);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Workload,baseline,1e-7,1e-7_pin");
        assert_eq!(lines[1], "401.bzip2,2.0000,1.6000,N/A");
        assert_eq!(lines[2], "429.mcf,1.0000,0.8000,0.9000");
        assert!(lines[3].starts_with("GEOMETRIC MEAN,1.4142,"));
    }

    #[test]
    fn empty_slice_renders_na_gmean() {
        let mut index = RecordIndex::new();
        index.insert(record("429.mcf", PageSize::Kb4, Some("1e-5"), false, None, None));
        let table = build_ipc_table(&index, PageSize::Kb4, "32gb");
        let csv = render_ipc_csv(&table);
        let footer = csv.lines().last().unwrap();
        assert_eq!(footer, "GEOMETRIC MEAN,N/A,N/A");
    }

    #[test]
    fn pinning_effect_ratios_and_gain() {
        let rows = build_pinning_effect(&sample_index());
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.page, "4kb");
        assert_eq!(row.error_rate, "1e-7");

        // NoPin ratios: 0.8/1.0 and 1.6/2.0; pin ratio only for 429.mcf.
        assert!((row.nopin_vs_base_gmean - 0.8).abs() < 1e-12);
        assert!((row.pin_vs_base_gmean - 0.9).abs() < 1e-12);
        assert!((row.pin_over_nopin_gmean - 1.125).abs() < 1e-12);
        assert!((row.nopin_delta_pct.unwrap() - -20.0).abs() < 1e-9);
        assert!((row.pin_gain_pct.unwrap() - 12.5).abs() < 1e-9);
        assert_eq!(row.nopin_samples, 2);
        assert_eq!(row.pin_samples, 1);
        assert_eq!(row.gain_samples, 1);
    }

    #[test]
    fn missing_baseline_is_excluded_not_zeroed() {
        let mut index = RecordIndex::new();
        // No baseline for this workload: ratios excluded, gain still valid.
        index.insert(record("429.mcf", PageSize::Kb4, Some("1e-7"), false, Some(0.8), None));
        index.insert(record("429.mcf", PageSize::Kb4, Some("1e-7"), true, Some(0.9), None));

        let rows = build_pinning_effect(&index);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.nopin_samples, 0);
        assert_eq!(row.pin_samples, 0);
        assert_eq!(row.gain_samples, 1);
        assert_eq!(row.nopin_vs_base_gmean, 0.0);
        assert_eq!(row.nopin_delta_pct, None);
    }

    fn way_record(
        workload: &str,
        page: PageSize,
        rate: &str,
        pinning: bool,
        ways: Option<(u32, f64)>,
    ) -> Record {
        let mut rec = record(workload, page, Some(rate), pinning, Some(1.0), None);
        if let Some((alloc, used)) = ways {
            rec.metrics.alloc_error_ways = Some(alloc);
            rec.metrics.used_way_pct = Some(used);
        }
        rec
    }

    #[test]
    fn way_usage_means_per_group() {
        let mut index = RecordIndex::new();
        index.insert(way_record("429.mcf", PageSize::Kb4, "1e-7", true, Some((4, 80.0))));
        index.insert(way_record("401.bzip2", PageSize::Kb4, "1e-7", true, Some((2, 60.0))));
        index.insert(way_record("429.mcf", PageSize::Mb2, "1e-7", true, Some((6, 50.0))));
        // Unpinned runs and pinned runs without way stats stay out.
        index.insert(way_record("470.lbm", PageSize::Kb4, "1e-7", false, Some((8, 90.0))));
        index.insert(way_record("462.libq", PageSize::Kb4, "1e-7", true, None));

        let rows = build_way_usage(&index);
        assert_eq!(rows.len(), 2);

        let kb4 = &rows[0];
        assert_eq!(kb4.page, "4kb");
        assert_eq!(kb4.error_rate, "1e-7");
        assert_eq!(kb4.llc_size_mb, 2);
        assert_eq!(kb4.samples, 2);
        assert!((kb4.mean_alloc_ways - 3.0).abs() < 1e-12);
        assert!((kb4.mean_used_pct - 70.0).abs() < 1e-12);

        let mb2 = &rows[1];
        assert_eq!(mb2.page, "2mb");
        assert_eq!(mb2.samples, 1);
        assert!((mb2.mean_alloc_ways - 6.0).abs() < 1e-12);
    }

    #[test]
    fn way_usage_csv_shape() {
        let mut index = RecordIndex::new();
        index.insert(way_record("429.mcf", PageSize::Kb4, "1e-7", true, Some((4, 87.5))));

        let csv = render_way_usage_csv(&build_way_usage(&index));
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "LLC_MB,Page,MTBCE,AllocatedWays,UsedPct,Samples");
        assert_eq!(lines[1], "2,4kb,1e-7,4.00,87.50,1");
    }

    #[test]
    fn no_pinning_runs_means_no_way_usage_rows() {
        // sample_index has a pinned run but no way stats at all.
        assert!(build_way_usage(&sample_index()).is_empty());
    }

    #[test]
    fn rbmpki_ranking_orders_and_classifies() {
        let mut index = RecordIndex::new();
        index.insert(record("a.first", PageSize::Kb4, None, false, Some(1.0), Some(4.0)));
        index.insert(record("b.second", PageSize::Kb4, None, false, Some(1.0), Some(12.5)));
        index.insert(record("c.third", PageSize::Kb4, None, false, Some(1.0), Some(10.0)));
        index.insert(record("d.unknown", PageSize::Kb4, None, false, Some(1.0), None));

        let all = index.by_coordinate(&CoordinateFilter::any());
        let ranking = build_rbmpki_ranking(&all);

        let order: Vec<&str> = ranking.iter().map(|r| r.workload.as_str()).collect();
        assert_eq!(order, vec!["b.second", "c.third", "a.first"]);
        assert_eq!(ranking[0].intensity, MemoryIntensity::High);
        assert_eq!(ranking[1].intensity, MemoryIntensity::Medium);
        assert_eq!(ranking[2].intensity, MemoryIntensity::Low);
    }

    #[test]
    fn csv_escaping() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
