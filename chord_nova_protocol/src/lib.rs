// chord_nova_protocol — JSON contract for the Chord Nova engine.
//
// This crate turns request documents into engine calls and engine results
// into response documents. It is what a UI or any other external caller
// talks to: three operations (generate, analyse, substitute), each taking
// and returning JSON, and never failing across the boundary. Errors come
// back as `{"error": ..., "category": ...}`.
//
// Module overview:
// - `message.rs`:  Request structs, the `op`-tagged `Request` envelope, and
//                  response documents.
// - `error.rs`:    `ProtocolError`, adding the `parse` category to the
//                  engine's own error categories.
// - `main.rs`:     The `chordnova` CLI (generate/analyse/substitute/serve).
//
// Design decisions:
// - **JSON serialization.** Matches the engine's serde_json usage; floats
//   round-trip exactly (`float_roundtrip`).
// - **One engine per request.** Engines are cheap (just a scoring policy)
//   and a request may carry its own weights.
// - **Line-delimited serving.** `handle_line` maps one request line to one
//   response line, so `serve` is a plain stdin/stdout loop.

pub mod error;
pub mod message;

use std::time::Duration;

use chord_nova_core::{Analysis, Chord, Engine, Generation, SearchBudget, Substitution};

pub use error::ProtocolError;
pub use message::{
    AnalyseRequest, CandidateDoc, ErrorResponse, GenerateRequest, GenerateResponse, Request, Response, ScoringDoc,
    SubstituteEntryDoc, SubstitutePairDoc, SubstituteRequest, SubstituteResponse,
};

fn budget(timeout_ms: Option<u64>) -> SearchBudget {
    match timeout_ms {
        Some(ms) => SearchBudget::unlimited().with_timeout(Duration::from_millis(ms)),
        None => SearchBudget::unlimited(),
    }
}

impl GenerateRequest {
    /// Run the request, keeping the engine's own result.
    pub fn run(&self) -> Result<Generation, ProtocolError> {
        let seed = Chord::parse_midi(&self.chord)?;
        let engine = Engine::with_scoring(self.scoring.scoring());
        let budget = budget(self.timeout_ms);
        let generation = if self.parallel {
            engine.generate_partitioned(&seed, &self.config, &budget)?
        } else {
            engine.generate_with_budget(&seed, &self.config, &budget)?
        };
        Ok(generation)
    }

    pub fn execute(&self) -> Result<GenerateResponse, ProtocolError> {
        Ok(generation_response(&self.run()?))
    }
}

pub fn generation_response(generation: &Generation) -> GenerateResponse {
    GenerateResponse {
        candidates: generation.candidates.iter().map(CandidateDoc::from).collect(),
        total_evaluated: generation.total_evaluated,
        interrupted: generation.interrupted,
    }
}

impl AnalyseRequest {
    pub fn execute(&self) -> Result<Analysis, ProtocolError> {
        let ante = Chord::parse_midi(&self.ante)?;
        let post = Chord::parse_midi(&self.post)?;
        Ok(Engine::with_scoring(self.scoring.scoring()).analyse(&ante, &post)?)
    }
}

impl SubstituteRequest {
    pub fn run(&self) -> Result<Substitution, ProtocolError> {
        let ante = Chord::parse_midi(&self.ante)?;
        let post = Chord::parse_midi(&self.post)?;
        let engine = Engine::with_scoring(self.scoring.scoring());
        Ok(engine.substitute_with_budget(&ante, &post, &self.config, &budget(self.timeout_ms))?)
    }

    pub fn execute(&self) -> Result<SubstituteResponse, ProtocolError> {
        let s = self.run()?;
        Ok(SubstituteResponse {
            entries: s.entries.iter().map(SubstituteEntryDoc::from).collect(),
            pairs: s.pairs.iter().map(SubstitutePairDoc::from).collect(),
            total_evaluated: s.total_evaluated,
            interrupted: s.interrupted,
        })
    }
}

impl From<ProtocolError> for Response {
    fn from(e: ProtocolError) -> Self {
        log::debug!("request failed ({}): {e}", e.category());
        Response::Error(ErrorResponse {
            error: e.to_string(),
            category: e.category().to_string(),
        })
    }
}

/// Run a request. Failures become `Response::Error`.
pub fn handle(request: &Request) -> Response {
    let result = match request {
        Request::Generate(r) => r.execute().map(Response::Generate),
        Request::Analyse(r) => r.execute().map(|a| Response::Analyse(Box::new(a))),
        Request::Substitute(r) => r.execute().map(Response::Substitute),
    };
    result.unwrap_or_else(Response::from)
}

/// Serialize a response. Serializing these documents cannot fail in
/// practice; should it, the failure itself is reported as a document.
pub fn to_json(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        serde_json::json!({
            "error": format!("could not serialize response: {e}"),
            "category": "parse",
        })
        .to_string()
    })
}

/// One request line in, one response line out.
pub fn handle_line(line: &str) -> String {
    let response = match serde_json::from_str::<Request>(line) {
        Ok(request) => handle(&request),
        Err(e) => ProtocolError::from(e).into(),
    };
    to_json(&response)
}

fn parse<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(json)?)
}

/// `generate(chord, config)` over JSON strings. An empty config string
/// means all defaults.
pub fn generate(chord_json: &str, config_json: &str) -> String {
    let request = || -> Result<Response, ProtocolError> {
        let request = GenerateRequest {
            chord: parse(chord_json)?,
            config: if config_json.trim().is_empty() { Default::default() } else { parse(config_json)? },
            scoring: ScoringDoc::default(),
            parallel: false,
            timeout_ms: None,
        };
        Ok(Response::Generate(request.execute()?))
    };
    to_json(&request().unwrap_or_else(Response::from))
}

/// `analyse(ante, post)` over JSON strings.
pub fn analyse_chords(ante_json: &str, post_json: &str) -> String {
    let request = || -> Result<Response, ProtocolError> {
        let request = AnalyseRequest {
            ante: parse(ante_json)?,
            post: parse(post_json)?,
            scoring: ScoringDoc::default(),
        };
        Ok(Response::Analyse(Box::new(request.execute()?)))
    };
    to_json(&request().unwrap_or_else(Response::from))
}

/// `substitute(ante, post, config)` over JSON strings.
pub fn substitute_chords(ante_json: &str, post_json: &str, config_json: &str) -> String {
    let request = || -> Result<Response, ProtocolError> {
        let request = SubstituteRequest {
            ante: parse(ante_json)?,
            post: parse(post_json)?,
            config: if config_json.trim().is_empty() { Default::default() } else { parse(config_json)? },
            scoring: ScoringDoc::default(),
            timeout_ms: None,
        };
        Ok(Response::Substitute(request.execute()?))
    };
    to_json(&request().unwrap_or_else(Response::from))
}
