use async_trait::async_trait;
use futures::future::join_all;
use sii_client::{
    LookupError, ResponseParser, SiiClient, Transport, TransportError, TransportRequest,
    TransportResponse,
};
use sii_core::{Activity, ClientConfig};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const CAPTCHA_URL: &str = "https://captcha.test/CViewCaptcha.cgi";
const LOOKUP_URL: &str = "https://lookup.test/getstc";
const SAMPLE: &str = "iVBORw0KGgoAAQIDBAUGBwgJCgsMDQ4PEBESExQVFhcYGRobN1E0S0lFTkSuQmCC";
const REJECTED: &str = "<html><body><script>alert('Por favor reingrese Captcha')</script></body></html>";

/// Answers captcha requests with a fixed challenge and lookup requests from a
/// script; once the script runs dry the last lookup reply is repeated.
struct FakeUpstream {
    lookups: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    last: Mutex<Option<Result<TransportResponse, TransportError>>>,
    captcha_calls: AtomicUsize,
    lookup_requests: Mutex<Vec<TransportRequest>>,
}

impl FakeUpstream {
    fn new(lookups: Vec<Result<TransportResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            lookups: Mutex::new(lookups.into()),
            last: Mutex::new(None),
            captcha_calls: AtomicUsize::new(0),
            lookup_requests: Mutex::new(Vec::new()),
        })
    }

    fn captcha_calls(&self) -> usize {
        self.captcha_calls.load(Ordering::SeqCst)
    }

    fn lookup_calls(&self) -> usize {
        self.lookup_requests.lock().expect("lock").len()
    }
}

#[async_trait]
impl Transport for FakeUpstream {
    async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        if request.url == CAPTCHA_URL {
            self.captcha_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(TransportResponse {
                status: 200,
                body: format!(r#"{{"txtCaptcha":"{SAMPLE}"}}"#),
            });
        }

        self.lookup_requests.lock().expect("lock").push(request);
        let next = self.lookups.lock().expect("lock").pop_front();
        let mut last = self.last.lock().expect("lock");
        if let Some(reply) = next {
            *last = Some(reply);
        }
        last.clone()
            .unwrap_or_else(|| Err(TransportError::Connect("no scripted reply".to_string())))
    }
}

fn html(body: &str) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse {
        status: 200,
        body: body.to_string(),
    })
}

fn record_page(name: &str) -> String {
    format!(
        r#"<html><body><div>
            <div>Servicio de Impuestos Internos</div>
            <div>Consulta Situaci&oacute;n Tributaria de Terceros</div>
            <div>Nombre o Raz&oacute;n Social:</div>
            <div>{name}</div>
            <table>
                <tr><td><font>Actividades</font></td><td><font>C&oacute;digo</font></td></tr>
                <tr><td><font>OTRAS ACTIVIDADES DE SERVICIOS</font></td><td><font>829900</font></td></tr>
                <tr><td><font>Documentos Timbrados</font></td><td><font>2014</font></td></tr>
            </table>
        </div></body></html>"#
    )
}

fn config() -> ClientConfig {
    ClientConfig {
        captcha_url: CAPTCHA_URL.to_string(),
        lookup_url: LOOKUP_URL.to_string(),
        max_backoff_ms: 0,
        ..ClientConfig::default()
    }
}

fn client(upstream: Arc<FakeUpstream>, config: &ClientConfig) -> SiiClient {
    SiiClient::with_transport(config, upstream).with_parser(ResponseParser::new().with_current_year(2024))
}

#[tokio::test]
async fn test_lookup_returns_record() {
    let upstream = FakeUpstream::new(vec![html(&record_page(
        "MIGUEL JUAN SEBASTIAN PINERA ECHENIQUE",
    ))]);
    let client = client(upstream.clone(), &config());

    let found = client.lookup("5.126.663-3").await.expect("record");

    assert_eq!(found.citizen.rut, "5126663-3");
    assert_eq!(found.citizen.name, "MIGUEL JUAN SEBASTIAN PINERA ECHENIQUE");
    assert_eq!(
        found.citizen.activities,
        vec![Activity::new("829900").with_name("OTRAS ACTIVIDADES DE SERVICIOS")]
    );
    // one captcha fetch plus one lookup
    assert_eq!(found.metrics.total_request_count, 2);
    assert_eq!(found.metrics.attempts_used, 1);
    assert_eq!(client.request_count(), 2);

    let requests = upstream.lookup_requests.lock().expect("lock");
    assert!(requests[0].body.starts_with("RUT=5126663&DV=3&"));
    assert!(requests[0].body.contains("txt_code=7Q4K"));
}

#[tokio::test]
async fn test_input_formats_are_equivalent() {
    let upstream = FakeUpstream::new(vec![html(&record_page("ACME SPA"))]);
    let client = client(upstream.clone(), &config());

    let mut citizens = Vec::new();
    for input in ["5.126.663-3", "51266633", "5126.6633", " 5126663-3 "] {
        citizens.push(client.lookup(input).await.expect("record").citizen);
    }

    assert!(citizens.windows(2).all(|pair| pair[0] == pair[1]));
    // the credential is reused across lookups
    assert_eq!(upstream.captcha_calls(), 1);
}

#[tokio::test]
async fn test_invalid_rut_makes_no_network_call() {
    let upstream = FakeUpstream::new(vec![]);
    let client = client(upstream.clone(), &config());

    for input in ["51266633111", "", "5", "51A66633"] {
        let err = client.lookup(input).await.expect_err("invalid input");
        assert!(err.is_caller_error(), "{input:?} gave {err}");
        assert!(err.metrics().is_none());
    }

    assert_eq!(upstream.captcha_calls(), 0);
    assert_eq!(upstream.lookup_calls(), 0);
    assert_eq!(client.request_count(), 0);
}

#[tokio::test]
async fn test_not_found() {
    let upstream = FakeUpstream::new(vec![html(&record_page("**"))]);
    let client = client(upstream, &config());

    let err = client.lookup("1-9").await.expect_err("no record");

    assert!(err.is_not_found());
    match err {
        LookupError::NotFound { rut, metrics } => {
            assert_eq!(rut, "1-9");
            assert_eq!(metrics.total_request_count, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_rejected_captcha_is_renewed() {
    let upstream = FakeUpstream::new(vec![html(REJECTED), html(&record_page("ACME SPA"))]);
    let renewals = Arc::new(AtomicUsize::new(0));
    let seen = renewals.clone();
    let client = client(upstream.clone(), &config()).on_new_credential(move |credential| {
        assert_eq!(credential.solution_text, "7Q4K");
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let found = client.lookup("51266633").await.expect("record after renewal");

    assert_eq!(found.citizen.name, "ACME SPA");
    assert_eq!(upstream.captcha_calls(), 2);
    assert_eq!(upstream.lookup_calls(), 2);
    assert_eq!(renewals.load(Ordering::SeqCst), 2);
    // two fetches and two lookups, reported on the final cycle
    assert_eq!(found.metrics.total_request_count, 4);
    assert_eq!(found.metrics.attempts_used, 1);
}

#[tokio::test]
async fn test_persistent_rejection_is_bounded() {
    let upstream = FakeUpstream::new(vec![html(REJECTED)]);
    let config = ClientConfig {
        max_captcha_retries: 2,
        ..config()
    };
    let client = client(upstream.clone(), &config);

    let err = client.lookup("51266633").await.expect_err("never accepted");

    match err {
        LookupError::CaptchaRetryExhausted { retries, metrics } => {
            assert_eq!(retries, 2);
            assert_eq!(metrics.total_request_count, 6);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(upstream.lookup_calls(), 3);
    assert_eq!(upstream.captcha_calls(), 3);
}

#[tokio::test]
async fn test_transport_failure_after_retries() {
    let upstream = FakeUpstream::new(vec![Err(TransportError::Timeout("deadline elapsed".to_string()))]);
    let client = client(upstream.clone(), &config());

    let err = client.lookup("51266633").await.expect_err("unreachable");

    assert!(err.is_retryable());
    assert!(matches!(
        err,
        LookupError::Transport {
            source: TransportError::Timeout(_),
            ..
        }
    ));
    assert_eq!(err.metrics().map(|m| m.attempts_used), Some(3));
    assert_eq!(upstream.lookup_calls(), 3);
}

#[tokio::test]
async fn test_unclassifiable_body_is_malformed() {
    let upstream = FakeUpstream::new(vec![Ok(TransportResponse {
        status: 502,
        body: String::new(),
    })]);
    let client = client(upstream, &config());

    match client.lookup("51266633").await {
        Err(LookupError::MalformedResponse { status, .. }) => assert_eq!(status, 502),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_page_is_not_a_missing_record() {
    let upstream = FakeUpstream::new(vec![Ok(TransportResponse {
        status: 503,
        body: "<html><body><h1>Service Unavailable</h1></body></html>".to_string(),
    })]);
    let client = client(upstream, &config());

    let err = client.lookup("5.126.663-3").await.expect_err("error page");

    assert!(!err.is_not_found());
    match err {
        LookupError::MalformedResponse { status, metrics, .. } => {
            assert_eq!(status, 503);
            assert_eq!(metrics.attempts_used, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_error_status_with_record_still_resolves() {
    let upstream = FakeUpstream::new(vec![Ok(TransportResponse {
        status: 500,
        body: record_page("ACME SPA"),
    })]);
    let client = client(upstream, &config());

    let found = client.lookup("51266633").await.expect("record");
    assert_eq!(found.citizen.name, "ACME SPA");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_share_one_captcha() {
    let upstream = FakeUpstream::new(vec![html(&record_page("ACME SPA"))]);
    let client = Arc::new(client(upstream.clone(), &config()));

    let results = join_all((0..8).map(|_| {
        let client = client.clone();
        tokio::spawn(async move { client.lookup("51266633").await })
    }))
    .await;

    for result in results {
        let found = result.expect("task").expect("record");
        assert_eq!(found.citizen.name, "ACME SPA");
    }
    assert_eq!(upstream.captcha_calls(), 1);
    assert_eq!(client.request_count(), 9);
}

#[tokio::test]
#[ignore = "requires network access to zeus.sii.cl"]
async fn test_live_lookup() {
    let client = SiiClient::new(&ClientConfig::default()).expect("client");
    match client.lookup("5.126.663-3").await {
        Ok(found) => assert!(!found.citizen.name.is_empty()),
        Err(e) => assert!(!e.is_caller_error(), "unexpected caller error: {e}"),
    }
}
