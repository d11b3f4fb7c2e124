//! Compile scenario mocks into a route table

use reqwest::Method;
use tracing::debug;

use jwt_pizza_mock::api::Endpoint;
use jwt_pizza_mock::{Expectation, RequestPredicate, RouteTable};

use crate::error::{E2eError, E2eResult};
use crate::spec::{MockSpec, Scenario, WhenSpec};

/// Origin used to turn a pattern into a representative URL
const SAMPLE_ORIGIN: &str = "http://localhost:5173";

/// Build the ordered route table for a scenario
pub fn compile(scenario: &Scenario) -> E2eResult<RouteTable> {
    let mut table = RouteTable::new();

    for (index, mock) in scenario.mocks.iter().enumerate() {
        let when = match &mock.when {
            Some(when) => predicate(when).map_err(|reason| spec_error(scenario, index, &reason))?,
            None => RequestPredicate::Always,
        };
        let expectation = expectation(mock).map_err(|reason| spec_error(scenario, index, &reason))?;

        table.route_when(&mock.pattern, when, expectation)?;
    }

    debug!(
        "Compiled {} mock rule(s) for scenario '{}'",
        table.len(),
        scenario.name
    );
    Ok(table)
}

fn spec_error(scenario: &Scenario, index: usize, reason: &str) -> E2eError {
    E2eError::SpecParse(format!(
        "scenario '{}', mock #{}: {}",
        scenario.name,
        index + 1,
        reason
    ))
}

fn parse_method(method: &str) -> Result<Method, String> {
    let upper = method.trim().to_ascii_uppercase();
    match upper.as_str() {
        "GET" | "POST" | "PUT" | "DELETE" | "PATCH" | "HEAD" | "OPTIONS" => {
            Method::from_bytes(upper.as_bytes()).map_err(|e| e.to_string())
        }
        _ => Err(format!("unsupported HTTP method '{}'", method)),
    }
}

fn predicate(when: &WhenSpec) -> Result<RequestPredicate, String> {
    let mut all = Vec::new();

    if let Some(method) = &when.method {
        all.push(RequestPredicate::Method(parse_method(method)?));
    }
    if let Some(body) = &when.body {
        all.push(RequestPredicate::BodyMatches(body.clone()));
    }
    match when.has_body {
        Some(true) => all.push(RequestPredicate::BodyPresent),
        Some(false) => all.push(RequestPredicate::BodyAbsent),
        None => {}
    }

    Ok(match all.len() {
        0 => RequestPredicate::Always,
        1 => all.remove(0),
        _ => RequestPredicate::All(all),
    })
}

fn expectation(mock: &MockSpec) -> Result<Expectation, String> {
    let method = mock
        .expect
        .method
        .as_deref()
        .map(parse_method)
        .transpose()?;

    Ok(Expectation {
        method,
        body: mock.expect.body.clone(),
        response: mock.respond.clone(),
    })
}

impl MockSpec {
    /// Representative URL for this mock's pattern, if the pattern names one path
    pub fn sample_url(&self) -> Option<String> {
        let path = self
            .pattern
            .trim_start_matches("*/**")
            .trim_start_matches("**");
        if !path.starts_with('/') || path.contains(['*', '{', '}']) {
            return None;
        }
        Some(format!("{}{}", SAMPLE_ORIGIN, path))
    }

    /// Backend endpoint this mock stands in for, when it can be identified
    pub fn endpoint(&self) -> Option<Endpoint> {
        let method = parse_method(self.expect.method.as_deref()?).ok()?;
        Endpoint::classify(&method, &self.sample_url()?)
    }
}

/// Check every identifiable mock against the typed backend contract
pub fn validate_contract(scenario: &Scenario) -> E2eResult<()> {
    for (index, mock) in scenario.mocks.iter().enumerate() {
        let Some(endpoint) = mock.endpoint() else {
            debug!(
                "Mock #{} ({}) in '{}' is outside the known contract",
                index + 1,
                mock.pattern,
                scenario.name
            );
            continue;
        };

        let violation = |e: jwt_pizza_mock::MockError| E2eError::Contract {
            scenario: scenario.name.clone(),
            reason: format!("mock #{} ({:?}): {}", index + 1, endpoint, e),
        };

        if let Some(body) = &mock.expect.body {
            endpoint.validate_request(body).map_err(violation)?;
        }
        if (200..300).contains(&mock.respond.status) {
            endpoint.validate_response(&mock.respond.json).map_err(violation)?;
        }
    }
    Ok(())
}
