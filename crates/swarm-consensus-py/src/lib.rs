use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use swarm_consensus_core::config::SimConfig;

/// Minimal PyO3 module exposing swarm-consensus-core to a Python replicate runner.
#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pyfunction]
fn default_config_json() -> PyResult<String> {
    serde_json::to_string(&SimConfig::default())
        .map_err(|e| PyValueError::new_err(format!("failed to serialize default config: {e}")))
}

fn parse_config(config_json: &str) -> PyResult<SimConfig> {
    serde_json::from_str(config_json)
        .map_err(|e| PyValueError::new_err(format!("invalid config json: {e}")))
}

#[pyfunction]
fn validate_config_json(config_json: &str) -> PyResult<bool> {
    parse_config(config_json)?
        .validate()
        .map(|_| true)
        .map_err(|e| PyValueError::new_err(format!("invalid simulation configuration: {e}")))
}

/// Run one replicate and return the outcome as JSON. The GIL is released
/// while simulating so callers can fan replicates out over threads.
#[pyfunction]
#[pyo3(signature = (config_json, seed=None))]
fn run_json(py: Python<'_>, config_json: &str, seed: Option<u64>) -> PyResult<String> {
    let mut config = parse_config(config_json)?;
    if let Some(seed) = seed {
        config.seed = seed;
    }
    config
        .validate()
        .map_err(|e| PyValueError::new_err(format!("invalid simulation configuration: {e}")))?;
    let outcome = py
        .allow_threads(|| swarm_consensus_core::run(config))
        .map_err(|e| PyRuntimeError::new_err(format!("simulation aborted: {e}")))?;
    serde_json::to_string(&outcome)
        .map_err(|e| PyValueError::new_err(format!("failed to serialize outcome: {e}")))
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_function(wrap_pyfunction!(default_config_json, m)?)?;
    m.add_function(wrap_pyfunction!(validate_config_json, m)?)?;
    m.add_function(wrap_pyfunction!(run_json, m)?)?;
    Ok(())
}
