/// Configuration entry-point for the analysis.
///
/// Passed to `ChainGraphBuilder::with_config` and carried over into the
/// frozen `ChainGraph`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Time assigned to every chain node when no per-node time function is
    /// supplied. With the default of `1.0` the critical path is the longest
    /// path by hop count.
    pub default_node_time: f64,
    /// Largest id the shared node/register counter may hand out.
    pub max_chain_id: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_node_time: 1.0,
            max_chain_id: i64::MAX,
        }
    }
}
