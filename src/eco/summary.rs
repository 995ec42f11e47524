// The JSON summary and the CSV export of the draws.

use std::fs;
use std::io::Write;

use serde_json::json;
use serde_json::Value as JSValue;

use crate::eco::*;

fn element_js(s: &ElementSummary) -> JSValue {
    json!({
        "mean": s.mean,
        "sd": s.sd,
        "hdiLow": s.hdi_low,
        "hdiHigh": s.hdi_high,
        "rHat": s.r_hat,
        "essBulk": s.ess_bulk,
    })
}

fn config_js(settings: &RunSettings) -> JSValue {
    json!({
        "input": settings.input_path,
        "district": settings.district,
        "party": settings.inference.party.to_string(),
        "groupName": settings.inference.group_name(),
        "lam": settings.inference.lam,
        "skipEmptyPrecincts": settings.inference.skip_empty_precincts,
        "draws": settings.sampler.draws,
        "tune": settings.sampler.tune,
        "chains": settings.sampler.chains,
        "targetAccept": settings.sampler.target_accept,
        "maxTreedepth": settings.sampler.max_treedepth,
    })
}

fn precincts_js(rows: &[PrecinctRow], run: &InferenceRun) -> Vec<JSValue> {
    let names = run.model.names();
    let obs = run.model.observations();
    let observed_rates = obs.observed_rates();
    let pct_minority = run.trace.summarize(&names.pct_minority).unwrap_or_default();
    let pct_majority = run.trace.summarize(&names.pct_majority).unwrap_or_default();
    let est = run.trace.summarize(&names.est).unwrap_or_default();

    let mut l: Vec<JSValue> = Vec::new();
    for (i, row_idx) in run.kept_rows.iter().enumerate() {
        let label = rows.get(*row_idx).and_then(|r| r.label.clone());
        l.push(json!({
            "label": label,
            "row": row_idx,
            "minorityFraction": obs.minority_fraction[i],
            "votes": obs.votes_for_group[i],
            "votingPopulation": obs.voting_population[i],
            "observedRate": observed_rates[i],
            "pctMinority": pct_minority.get(i).map(element_js),
            "pctMajority": pct_majority.get(i).map(element_js),
            "est": est.get(i).map(element_js),
        }));
    }
    l
}

fn hyperparameters_js(run: &InferenceRun) -> JSValue {
    let names = run.model.names();
    let mut hyper = serde_json::Map::new();
    for name in [&names.alpha, &names.beta] {
        let elements: Vec<JSValue> = run
            .trace
            .summarize(name)
            .unwrap_or_default()
            .iter()
            .map(element_js)
            .collect();
        hyper.insert(name.clone(), JSValue::Array(elements));
    }
    JSValue::Object(hyper)
}

fn diagnostics_js(run: &InferenceRun) -> JSValue {
    let summary = run.trace.summary();
    let max_r_hat = summary
        .iter()
        .map(|s| s.r_hat)
        .filter(|x| x.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    let min_ess = summary
        .iter()
        .map(|s| s.ess_bulk)
        .filter(|x| x.is_finite())
        .fold(f64::INFINITY, f64::min);
    let chains: Vec<JSValue> = run
        .trace
        .chain_stats()
        .iter()
        .map(|c| {
            json!({
                "stepSize": c.step_size,
                "divergences": c.n_divergent(),
            })
        })
        .collect();
    json!({
        "seed": run.trace.seed(),
        "divergences": run.trace.divergences(),
        "maxRHat": finite_or_null(max_r_hat),
        "minEssBulk": finite_or_null(min_ess),
        "chains": chains,
    })
}

// JSON has no infinities.
fn finite_or_null(x: f64) -> Option<f64> {
    if x.is_finite() {
        Some(x)
    } else {
        None
    }
}

pub fn build_summary_js(settings: &RunSettings, rows: &[PrecinctRow], run: &InferenceRun) -> JSValue {
    json!({
        "config": config_js(settings),
        "precincts": precincts_js(rows, run),
        "hyperparameters": hyperparameters_js(run),
        "diagnostics": diagnostics_js(run),
    })
}

/// Writes the summary to the standard output if the path is `stdout`.
pub fn write_summary(js: &JSValue, path: &str) -> EcoCliResult<()> {
    let pretty_js = serde_json::to_string_pretty(js).context(ParsingJsonSnafu {})?;
    if path == STDOUT {
        println!("{}", pretty_js);
    } else {
        let mut f = fs::File::create(path).context(WritingOutputSnafu { path })?;
        writeln!(f, "{}", pretty_js).context(WritingOutputSnafu { path })?;
        info!("Summary written to {:?}", path);
    }
    Ok(())
}

/// Writes all the draws in long format: `chain,draw,variable,index,value`.
pub fn write_trace_csv(trace: &Trace, path: &str) -> EcoCliResult<()> {
    let mut wtr = csv::Writer::from_path(path).context(CsvWriteSnafu {})?;
    wtr.write_record(["chain", "draw", "variable", "index", "value"])
        .context(CsvWriteSnafu {})?;
    for var in trace.variables() {
        for c in 0..trace.n_chains() {
            for (d, draw) in var.chain(c).unwrap_or_default().iter().enumerate() {
                for (j, x) in draw.iter().enumerate() {
                    wtr.write_record(&[
                        c.to_string(),
                        d.to_string(),
                        var.name.clone(),
                        j.to_string(),
                        x.to_string(),
                    ])
                    .context(CsvWriteSnafu {})?;
                }
            }
        }
    }
    wtr.flush().context(WritingOutputSnafu { path })?;
    info!("Trace written to {:?}", path);
    Ok(())
}
