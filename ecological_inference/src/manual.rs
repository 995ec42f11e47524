/*!

This is the long-form manual for `ecological_inference` and `ecoinfer`.

## The model

Each precinct `i` reports the number of votes `votes_for_group[i]` a party got out of
`voting_population[i]` votes, and the census gives the fraction `f[i]` of the
population that belongs to the minority group. The model assumes that the minority
voted for the party at a rate `pct_minority[i]` and the majority at a rate
`pct_majority[i]`, so that the expected share of the party is

```text
est[i] = f[i] * pct_minority[i] + (1 - f[i]) * pct_majority[i]
```

The rates of each group are drawn from a Beta distribution whose shapes are shared by
all the precincts, and the shapes have exponential priors:

```text
alpha[g], beta[g]   ~ Exponential(lam)
pct_minority[i]     ~ Beta(alpha[0], beta[0])
pct_majority[i]     ~ Beta(alpha[1], beta[1])
votes_for_group[i]  ~ Binomial(voting_population[i], est[i])
```

`lam` is 0.5 by default, as in King's book.

## Names

All the variables carry the group name, so that the results for several parties can be
kept side by side. For the group `dem`:

| variable | width |
|---|---|
| `alpha_dem` | 2 (minority, majority) |
| `beta_dem` | 2 |
| `pct_minority_voting_dem` | one per precinct |
| `pct_majority_voting_dem` | one per precinct |
| `est_voting_dem` | one per precinct (deterministic) |
| `votes_for_dem` | observed, not in the trace |

## Validation

The builder checks, in this order:
- the three input vectors have the same length,
- the group name is not empty and `lam` is finite and positive,
- there is at least one precinct,
- every precinct has votes, no more votes for the group than votes cast, and a
  minority fraction within `[0, 1]`.

When starting from a table, every row is passed to the builder: a precinct with no
population fails with `InvalidFraction` and one without votes with `EmptyPrecinct`.
Set `skip_empty_precincts` (`skipEmptyPrecincts` in the configuration file,
`--skip-empty-precincts` on the command line) to drop them with a warning instead.

## Sampling

The sampler is the No-U-Turn sampler of the `nuts-rs` crate, with:
- a random start around `alpha = beta = 1 / lam` and rates of 0.5, jittered uniformly in
  the unconstrained space (`initJitter`), with up to 10 attempts;
- `tune` warmup iterations adapting the step size towards `targetAccept` and a diagonal
  mass matrix, with trees of at most `maxTreedepth` levels;
- `draws` kept iterations per chain, chains running in parallel.

The defaults are 5000 draws, 1000 tuning iterations, 2 chains and a target acceptance of
0.98: the posterior of the model has a funnel shape that causes divergences with the
usual target of 0.8.

After sampling, warnings are logged for divergent transitions, for any R-hat above 1.05
and for any bulk effective sample size below 10% of the draws. They do not stop the
program: check them before trusting the results.

## Configuration

The `ecoinfer` program reads a JSON configuration file. All the sections are optional,
except for the path of the input file:

```json
{
  "input": {
    "provider": "csv",
    "filePath": "nc_district_1.csv",
    "totalColumn": "Total",
    "whiteAloneColumn": "White Alone",
    "demColumn": "DEM",
    "repColumn": "REP",
    "labelColumn": "precinct",
    "districtColumn": "district",
    "district": "1",
    "skipEmptyPrecincts": false
  },
  "model": { "lam": 0.5, "groupName": "dem", "party": "dem" },
  "sampler": { "draws": 5000, "tune": 1000, "chains": 2, "targetAccept": 0.98, "randomSeed": 42 },
  "outputSettings": { "summaryPath": "summary.json", "tracePath": "trace.csv" }
}
```

The providers are `csv` (with a header row) and `excel` (first worksheet, or the one
named by `excelWorksheetName`). Paths are relative to the configuration file.

Options on the command line take precedence over the configuration file.

## Outputs

The summary is a JSON document with the posterior mean and 94% HDI of the rates of each
precinct, the summary of the hyperparameters and the sampler diagnostics.

The trace is a CSV file in long format, with the columns `chain,draw,variable,index,value`.
*/
