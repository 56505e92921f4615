use crate::core::capture::run_captured;
use crate::core::parser::{ParseLimits, ValuationParser};
use crate::core::summary::summarize;
use crate::domain::model::{
    Agent, Algorithm, AllocationRound, AllocationSequence, Console, DemoPayload, FairnessVerdict,
    ValuationTable,
};
use crate::domain::ports::{AllocationEngine, Presenter};
use crate::utils::error::{AllocationError, DemoError, Result};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub const DEFAULT_UTILITIES: &str = "{\n  \"0\": {\"0\":11,\"1\":22},\n  \"1\": {\"0\":11,\"1\":22}\n}";
pub const DEFAULT_MAX_ROUNDS: usize = 1000;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Round-count precondition, engine call and fairness predicate of each
/// algorithm.
impl Algorithm {
    pub fn check_rounds(self, k: i64) -> Result<usize> {
        match self {
            Algorithm::TwoRound if k != 2 => Err(DemoError::round_count(format!(
                "Algorithm 1 works only for k = 2 (got k = {}).",
                k
            ))),
            Algorithm::GeneralEven if k < 2 || k % 2 != 0 => Err(DemoError::round_count(format!(
                "Algorithm 2 requires an even k >= 2 (got k = {}).",
                k
            ))),
            _ => usize::try_from(k)
                .map_err(|_| DemoError::round_count(format!("k = {} is out of range", k))),
        }
    }

    pub fn compute<E: AllocationEngine + ?Sized>(
        self,
        engine: &E,
        k: usize,
        utils: &ValuationTable,
        console: &Console,
    ) -> std::result::Result<AllocationSequence, AllocationError> {
        match self {
            Algorithm::TwoRound => engine.two_round(utils, console),
            Algorithm::GeneralEven => engine.general_even(k, utils, console),
        }
    }

    pub fn holds<E: AllocationEngine + ?Sized>(
        self,
        engine: &E,
        round: &AllocationRound,
        agent: Agent,
        utils: &ValuationTable,
    ) -> bool {
        match self {
            Algorithm::TwoRound => engine.ef1_holds(round, agent, utils),
            Algorithm::GeneralEven => engine.weak_ef1_holds(round, agent, utils),
        }
    }
}

/// One submission of the demo form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoRequest {
    pub utilities: String,
    pub k: i64,
    pub algo: String,
}

impl Default for DemoRequest {
    fn default() -> Self {
        Self {
            utilities: DEFAULT_UTILITIES.to_string(),
            k: 2,
            algo: "1".to_string(),
        }
    }
}

impl DemoRequest {
    pub fn new(utilities: impl Into<String>, k: i64, algo: impl Into<String>) -> Self {
        Self {
            utilities: utilities.into(),
            k,
            algo: algo.into(),
        }
    }

    /// Decodes an `application/x-www-form-urlencoded` submission.
    pub fn from_form_body(body: &str) -> Result<Self> {
        let mut utilities = None;
        let mut k = None;
        let mut algo = None;

        for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
            match key.as_ref() {
                "utilities" | "utilities_json" => utilities = Some(value.into_owned()),
                "k" => k = Some(value.into_owned()),
                "algo" => algo = Some(value.into_owned()),
                _ => tracing::debug!("ignoring form field {}", key),
            }
        }

        let utilities =
            utilities.ok_or_else(|| DemoError::malformed("form is missing the `utilities` field"))?;
        let k = match k.as_deref().map(str::trim) {
            None | Some("") => 2,
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| DemoError::round_count(format!("k must be an integer, got {:?}", raw)))?,
        };

        Ok(Self {
            utilities,
            k,
            algo: algo.unwrap_or_else(|| "1".to_string()),
        })
    }

    pub fn to_form_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("utilities", &self.utilities)
            .append_pair("k", &self.k.to_string())
            .append_pair("algo", &self.algo)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub algorithm: Algorithm,
    pub k: usize,
    pub utils: ValuationTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Received,
    Validated,
    Computed,
    Summarized,
    Rendered,
    Rejected,
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStage::Received => "received",
            RequestStage::Validated => "validated",
            RequestStage::Computed => "computed",
            RequestStage::Summarized => "summarized",
            RequestStage::Rendered => "rendered",
            RequestStage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

struct RequestTrace {
    id: u64,
    stage: RequestStage,
}

impl RequestTrace {
    fn start() -> Self {
        let id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(request_id = id, "request {}", RequestStage::Received);
        Self {
            id,
            stage: RequestStage::Received,
        }
    }

    fn advance(&mut self, stage: RequestStage) {
        tracing::debug!(request_id = self.id, "request {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    /// Logs the failure; client-input errors seen before computing reject
    /// the request, anything later is an internal failure.
    fn fail(&mut self, err: DemoError) -> DemoError {
        if err.is_client_error()
            && matches!(self.stage, RequestStage::Received | RequestStage::Validated)
        {
            tracing::warn!(request_id = self.id, "request rejected: {}", err);
            self.stage = RequestStage::Rejected;
        } else {
            tracing::error!(
                request_id = self.id,
                "request failed while {}: {}",
                self.stage,
                err
            );
        }
        err
    }
}

/// Runs one demo request from raw form input to rendered output. No state
/// is kept between requests.
pub struct RequestOrchestrator<E: AllocationEngine> {
    engine: E,
    parser: ValuationParser,
    max_rounds: usize,
}

impl<E: AllocationEngine> RequestOrchestrator<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            parser: ValuationParser::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_limits(mut self, limits: ParseLimits, max_rounds: usize) -> Self {
        self.parser = ValuationParser::new(limits);
        self.max_rounds = max_rounds;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Received -> Validated. Nothing here touches the engine.
    pub fn validate(&self, request: &DemoRequest) -> Result<ValidatedRequest> {
        let algorithm = Algorithm::from_selector(&request.algo);
        let utils = self.parser.parse(&request.utilities)?;

        let (only_agent0, only_agent1) = utils.item_universe_diff();
        if !only_agent0.is_empty() || !only_agent1.is_empty() {
            return Err(DemoError::ItemUniverseMismatch {
                only_agent0,
                only_agent1,
            });
        }

        let k = algorithm.check_rounds(request.k)?;
        if k > self.max_rounds {
            return Err(DemoError::round_count(format!(
                "k = {} exceeds the limit of {} rounds",
                k, self.max_rounds
            )));
        }

        Ok(ValidatedRequest { algorithm, k, utils })
    }

    /// Runs the request up to the presentation payload.
    pub fn prepare(&self, request: &DemoRequest) -> Result<DemoPayload> {
        let mut trace = RequestTrace::start();
        self.prepare_traced(request, &mut trace)
            .map_err(|err| trace.fail(err))
    }

    /// Runs the request and hands the payload to `presenter`.
    pub fn handle(&self, request: &DemoRequest, presenter: &dyn Presenter) -> Result<String> {
        let mut trace = RequestTrace::start();
        let result = self
            .prepare_traced(request, &mut trace)
            .and_then(|payload| presenter.render(&payload));
        match result {
            Ok(rendered) => {
                trace.advance(RequestStage::Rendered);
                Ok(rendered)
            }
            Err(err) => Err(trace.fail(err)),
        }
    }

    fn prepare_traced(&self, request: &DemoRequest, trace: &mut RequestTrace) -> Result<DemoPayload> {
        let ValidatedRequest { algorithm, k, utils } = self.validate(request)?;
        trace.advance(RequestStage::Validated);
        tracing::info!(
            request_id = trace.id,
            "running {} with k = {} over {} items",
            algorithm,
            k,
            utils.items().len()
        );

        let (computed, log_txt) =
            run_captured(|console| algorithm.compute(&self.engine, k, &utils, console));
        let rounds = match computed {
            Ok(rounds) => rounds,
            Err(err) => {
                tracing::debug!(request_id = trace.id, "diagnostics before failure:\n{}", log_txt);
                return Err(err.into());
            }
        };
        trace.advance(RequestStage::Computed);

        let vals = summarize(&rounds, &utils)?;
        check_sequence(&rounds, k, &utils)?;
        let checks: Vec<FairnessVerdict> = rounds
            .iter()
            .map(|round| {
                [
                    algorithm.holds(&self.engine, round, Agent::Zero, &utils),
                    algorithm.holds(&self.engine, round, Agent::One, &utils),
                ]
            })
            .collect();
        trace.advance(RequestStage::Summarized);

        Ok(DemoPayload {
            algorithm,
            fairness: algorithm.fairness_name(),
            utils,
            rounds,
            checks,
            vals,
            k,
            log_txt,
        })
    }
}

/// Length k, and every round splits the item universe between the agents.
fn check_sequence(rounds: &[AllocationRound], k: usize, utils: &ValuationTable) -> Result<()> {
    if rounds.len() != k {
        return Err(DemoError::InvalidAllocation {
            message: format!("expected {} rounds, engine returned {}", k, rounds.len()),
        });
    }
    let universe = utils.items();
    for (idx, round) in rounds.iter().enumerate() {
        let overlap = round.overlap();
        if !overlap.is_empty() {
            return Err(DemoError::InvalidAllocation {
                message: format!("round {} gives items {:?} to both agents", idx, overlap),
            });
        }
        if round.union() != universe {
            let missing: Vec<_> = universe.difference(&round.union()).copied().collect();
            return Err(DemoError::InvalidAllocation {
                message: format!("round {} leaves items {:?} unallocated", idx, missing),
            });
        }
    }
    Ok(())
}
