use crate::analysis_result::BeaconType;

/// Output of the beacon analyzer for a single `AnalysisResult` with `ts_list.len() >= 4`.
///
/// All scores are in `[0, 1]`, rounded to 3 decimals at publish time.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Beacon {
    pub beacon_type: BeaconType,
    pub overall_score: f64,
    pub ts_score: f64,
    pub ds_score: f64,
    pub dur_score: f64,
    pub hist_score: f64,

    /// Consecutive timestamp deltas, sorted ascending with leading zeros trimmed.
    pub ts_intervals: Vec<u32>,
    /// Multiplicity of each entry in `ts_intervals`: `ts_interval_counts[i]` is how many times
    /// `ts_intervals[i]`'s value repeats in the delta list.
    pub ts_interval_counts: Vec<u64>,

    /// Sorted `bytes_list`, as used by the data-size score.
    pub ds_sizes: Vec<f64>,
    /// Multiplicity of each entry in `ds_sizes`, paired the same way as `ts_interval_counts`.
    pub ds_size_counts: Vec<u64>,
}
