//! HTTP trigger endpoints

use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Reply};

use crate::pipeline::{Pipeline, RunSpec, RunState};

const FAILURE_BODY: &str = "Error when generating proof";

/// Everything a trigger needs to start a run
pub struct Triggers {
    pub pipeline: Arc<Pipeline>,
    pub volatility: RunSpec,
    pub compute: RunSpec,
    /// Cancelled on shutdown, aborting in-flight runs
    pub shutdown: CancellationToken,
}

#[derive(Serialize)]
struct SubmittedBody<'a> {
    run_id: &'a str,
    query_key: Option<&'a str>,
    receipts: usize,
}

pub fn routes(triggers: Arc<Triggers>) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .map(|| warp::reply::with_status("OK", StatusCode::OK).into_response());

    let with_triggers = warp::any().map(move || triggers.clone());

    let volatility = warp::path("volatility")
        .and(warp::path::end())
        .and(with_triggers.clone())
        .and_then(|t: Arc<Triggers>| async move {
            let spec = t.volatility;
            trigger(t, spec).await
        });

    // Bare root is the short window trigger too
    let root = warp::path::end()
        .and(with_triggers.clone())
        .and_then(|t: Arc<Triggers>| async move {
            let spec = t.volatility;
            trigger(t, spec).await
        });

    let compute = warp::path("compute")
        .and(warp::path::end())
        .and(with_triggers)
        .and_then(|t: Arc<Triggers>| async move {
            let spec = t.compute;
            trigger(t, spec).await
        });

    warp::get().and(
        health
            .or(root)
            .unify()
            .or(volatility)
            .unify()
            .or(compute)
            .unify(),
    )
}

async fn trigger(triggers: Arc<Triggers>, spec: RunSpec) -> Result<Response, Infallible> {
    info!("Create ZK proof for {} trigger", spec.schema);

    // Dropping this handler (client gone) abandons the run; the child token covers shutdown.
    let cancel = triggers.shutdown.child_token();
    let report = triggers.pipeline.run(spec, &cancel).await;

    let response = match report.state {
        RunState::Submitted => warp::reply::with_status(
            warp::reply::json(&SubmittedBody {
                run_id: &report.run_id,
                query_key: report.query_key.as_deref(),
                receipts: report.receipt_count,
            }),
            StatusCode::OK,
        )
        .into_response(),
        _ => warp::reply::with_status(FAILURE_BODY, StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation_client::MockAttestationClient;
    use crate::chain_client::MockChainClient;
    use crate::error::PipelineError;
    use crate::pipeline::PipelineSettings;
    use crate::prover_client::MockProofGenerationClient;
    use crate::schema::Schema;
    use crate::types::{CompletionStatus, Proof, QueryStatus, SubmissionResult};
    use alloy_primitives::Address;
    use std::time::Duration;

    fn settings() -> PipelineSettings {
        PipelineSettings {
            contract_address: Address::ZERO,
            topics: vec![],
            callback_address: Address::ZERO,
            api_key: None,
            src_chain_id: 1,
            dst_chain_id: 1,
            submission_option: 0,
            prove_timeout: Duration::from_secs(5),
            submit_timeout: Duration::from_secs(5),
            wait_timeout: Duration::from_secs(5),
            strict_field_check: false,
        }
    }

    fn triggers(prover: MockProofGenerationClient, attestation: MockAttestationClient) -> Arc<Triggers> {
        let mut chain = MockChainClient::new();
        chain.expect_current_height().returning(|| Ok(60_000));
        chain
            .expect_get_logs()
            .withf(|_, _, from, to| *to == 60_000 && (*from == 59_100 || *from == 10_000))
            .returning(|_, _, _, _| Ok(vec![]));

        let pipeline = Pipeline::new(Arc::new(chain), Arc::new(prover), Arc::new(attestation), settings());
        Arc::new(Triggers {
            pipeline: Arc::new(pipeline),
            volatility: RunSpec { schema: Schema::Volatility, lookback: 900 },
            compute: RunSpec { schema: Schema::Compute, lookback: 50_000 },
            shutdown: CancellationToken::new(),
        })
    }

    fn happy_clients() -> (MockProofGenerationClient, MockAttestationClient) {
        let mut prover = MockProofGenerationClient::new();
        prover.expect_prove().returning(|_| {
            Ok(Proof {
                proof: "0x01".to_string(),
                circuit_output: None,
            })
        });
        let mut attestation = MockAttestationClient::new();
        attestation
            .expect_submit()
            .returning(|_, _, _, _, _, _, _| Ok(SubmissionResult { query_key: "abc".to_string() }));
        attestation.expect_wait().returning(|key, _| {
            Ok(CompletionStatus {
                query_key: key.to_string(),
                status: QueryStatus::Completed,
                tx_hash: None,
            })
        });
        (prover, attestation)
    }

    #[tokio::test]
    async fn test_health() {
        let (prover, attestation) = happy_clients();
        let res = warp::test::request()
            .path("/health")
            .reply(&routes(triggers(prover, attestation)))
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body(), "OK");
    }

    #[tokio::test]
    async fn test_volatility_submitted() {
        let (prover, attestation) = happy_clients();
        let res = warp::test::request()
            .path("/volatility")
            .reply(&routes(triggers(prover, attestation)))
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["query_key"], "abc");
        assert_eq!(body["receipts"], 0);
    }

    #[tokio::test]
    async fn test_root_runs_volatility() {
        let (prover, attestation) = happy_clients();
        let res = warp::test::request()
            .path("/")
            .reply(&routes(triggers(prover, attestation)))
            .await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["query_key"], "abc");
        assert!(body["run_id"].as_str().unwrap().starts_with("volatility-"));
    }

    #[tokio::test]
    async fn test_compute_submitted() {
        let (prover, attestation) = happy_clients();
        let res = warp::test::request()
            .path("/compute")
            .reply(&routes(triggers(prover, attestation)))
            .await;

        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_failure_is_opaque() {
        let mut prover = MockProofGenerationClient::new();
        prover
            .expect_prove()
            .returning(|_| Err(PipelineError::ProofGeneration("circuit panicked at slot 7".to_string())));

        let res = warp::test::request()
            .path("/volatility")
            .reply(&routes(triggers(prover, MockAttestationClient::new())))
            .await;

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body(), FAILURE_BODY);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (prover, attestation) = happy_clients();
        let res = warp::test::request()
            .path("/bulk")
            .reply(&routes(triggers(prover, attestation)))
            .await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
