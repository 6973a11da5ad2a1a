//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. One task per
//! connection; all routing is a single method/path match below.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::db::MongoClient;
use crate::routes;
use crate::services::{
    AccessService, AnalyticsService, EngagementService, FeatureAccessTable, LedgerService,
    MongoUsageSource, MonetizationService, ProgressionService, SocialService, SpacesService,
};
use crate::types::Result;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// The business services, built once MongoDB is reachable
pub struct Services {
    pub progression: ProgressionService,
    pub access: AccessService,
    pub engagement: EngagementService,
    pub ledger: LedgerService,
    pub social: SocialService,
    pub monetization: MonetizationService,
    pub spaces: SpacesService,
    pub analytics: AnalyticsService,
}

impl Services {
    pub fn new(mongo: MongoClient, table: FeatureAccessTable) -> Self {
        let progression = ProgressionService::new(mongo.clone());
        let ledger = LedgerService::new(mongo.clone());
        let usage = Box::new(MongoUsageSource::new(mongo.clone()));
        Self {
            access: AccessService::new(mongo.clone(), table, usage),
            engagement: EngagementService::new(mongo.clone()),
            social: SocialService::new(mongo.clone(), progression.clone(), ledger.clone()),
            monetization: MonetizationService::new(mongo.clone(), ledger.clone()),
            spaces: SpacesService::new(mongo.clone()),
            analytics: AnalyticsService::new(mongo),
            progression,
            ledger,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: Option<MongoClient>,
    /// None in dev mode without MongoDB; routes answer 503 then
    pub services: Option<Services>,
    pub started_at: Instant,
}

impl AppState {
    /// Dev mode state without MongoDB; only health endpoints respond
    pub fn new(args: Args) -> Self {
        Self {
            args,
            mongo: None,
            services: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_mongo(args: Args, mongo: MongoClient, table: FeatureAccessTable) -> Self {
        Self {
            args,
            services: Some(Services::new(mongo.clone(), table)),
            mongo: Some(mongo),
            started_at: Instant::now(),
        }
    }
}

pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Lumen listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - running without MongoDB");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    info!("{} {}", method, path);

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let response = match (method, segments.as_slice()) {
        // Liveness probe
        (Method::GET, ["health"]) | (Method::GET, ["healthz"]) => {
            to_boxed(routes::health_check(Arc::clone(&state)))
        }

        // Readiness probe - 200 only with MongoDB connected (or dev mode)
        (Method::GET, ["ready"]) | (Method::GET, ["readyz"]) => {
            to_boxed(routes::readiness_check(Arc::clone(&state)))
        }

        (Method::GET, ["version"]) => to_boxed(routes::version_info()),

        // CORS preflight
        (Method::OPTIONS, _) => to_boxed(preflight_response()),

        // ====================================================================
        // Users
        // ====================================================================
        (Method::POST, ["api", "users"]) => {
            to_boxed(routes::create_user(Arc::clone(&state), req).await)
        }
        (Method::GET, ["api", "users", user_id]) => {
            to_boxed(routes::get_user(Arc::clone(&state), user_id).await)
        }
        (Method::PUT, ["api", "users", user_id]) => {
            let user_id = user_id.to_string();
            to_boxed(routes::update_user(Arc::clone(&state), &user_id, req).await)
        }
        (Method::DELETE, ["api", "users", user_id]) => {
            to_boxed(routes::delete_user(Arc::clone(&state), user_id).await)
        }

        // ====================================================================
        // Gamification and credits
        // ====================================================================
        (Method::POST, ["api", "users", user_id, "experience"]) => {
            let user_id = user_id.to_string();
            to_boxed(routes::award_experience(Arc::clone(&state), &user_id, req).await)
        }
        (Method::GET, ["api", "users", user_id, "access", feature]) => {
            to_boxed(routes::check_access(Arc::clone(&state), user_id, feature).await)
        }
        (Method::POST, ["api", "users", user_id, "usage", feature]) => {
            to_boxed(routes::record_usage(Arc::clone(&state), user_id, feature).await)
        }
        (Method::GET, ["api", "users", user_id, "engagement"]) => {
            to_boxed(routes::engagement_score(Arc::clone(&state), user_id).await)
        }
        (Method::GET, ["api", "users", user_id, "stats"]) => {
            to_boxed(routes::user_stats(Arc::clone(&state), user_id).await)
        }
        (Method::POST, ["api", "users", user_id, "credits"]) => {
            let user_id = user_id.to_string();
            to_boxed(routes::purchase_credits(Arc::clone(&state), &user_id, req).await)
        }
        (Method::POST, ["api", "users", user_id, "credits", "spend"]) => {
            let user_id = user_id.to_string();
            to_boxed(routes::spend_credits(Arc::clone(&state), &user_id, req).await)
        }
        (Method::GET, ["api", "users", user_id, "transactions"]) => {
            to_boxed(routes::transaction_history(Arc::clone(&state), user_id, query.as_deref()).await)
        }

        // ====================================================================
        // Social
        // ====================================================================
        (Method::POST, ["api", "posts"]) => {
            to_boxed(routes::create_post(Arc::clone(&state), req).await)
        }
        (Method::POST, ["api", "posts", post_id, "comments"]) => {
            let post_id = post_id.to_string();
            to_boxed(routes::create_comment(Arc::clone(&state), &post_id, req).await)
        }
        (Method::POST, ["api", "posts", post_id, "like"]) => {
            let post_id = post_id.to_string();
            to_boxed(routes::toggle_like(Arc::clone(&state), &post_id, req).await)
        }
        (Method::GET, ["api", "feed", user_id]) => {
            to_boxed(routes::get_feed(Arc::clone(&state), user_id, query.as_deref()).await)
        }
        (Method::POST, ["api", "connections"]) => {
            to_boxed(routes::request_connection(Arc::clone(&state), req).await)
        }
        (Method::POST, ["api", "connections", connection_id, "accept"]) => {
            to_boxed(routes::accept_connection(Arc::clone(&state), connection_id).await)
        }
        (Method::GET, ["api", "leaderboard"]) => {
            to_boxed(routes::leaderboard(Arc::clone(&state), query.as_deref()).await)
        }

        // ====================================================================
        // Challenges
        // ====================================================================
        (Method::POST, ["api", "challenges"]) => {
            to_boxed(routes::create_challenge(Arc::clone(&state), req).await)
        }
        (Method::POST, ["api", "challenges", challenge_id, "join"]) => {
            let challenge_id = challenge_id.to_string();
            to_boxed(routes::join_challenge(Arc::clone(&state), &challenge_id, req).await)
        }
        (Method::POST, ["api", "challenges", challenge_id, "complete"]) => {
            let challenge_id = challenge_id.to_string();
            to_boxed(routes::complete_challenge(Arc::clone(&state), &challenge_id, req).await)
        }

        // ====================================================================
        // Monetization
        // ====================================================================
        (Method::POST, ["api", "users", user_id, "subscribe"]) => {
            let user_id = user_id.to_string();
            to_boxed(routes::subscribe(Arc::clone(&state), &user_id, req).await)
        }
        (Method::POST, ["api", "users", user_id, "subscription", "cancel"]) => {
            to_boxed(routes::cancel_subscription(Arc::clone(&state), user_id).await)
        }
        (Method::POST, ["api", "users", user_id, "features", feature_id, "unlock"]) => {
            to_boxed(routes::unlock_feature(Arc::clone(&state), user_id, feature_id).await)
        }
        (Method::GET, ["api", "revenue"]) => {
            to_boxed(routes::revenue_summary(Arc::clone(&state)).await)
        }

        // ====================================================================
        // Spaces
        // ====================================================================
        (Method::GET, ["api", "spaces", "templates"]) => {
            to_boxed(routes::space_templates())
        }
        (Method::GET, ["api", "spaces"]) => {
            to_boxed(routes::list_spaces(Arc::clone(&state), query.as_deref()).await)
        }
        (Method::POST, ["api", "spaces"]) => {
            to_boxed(routes::create_space(Arc::clone(&state), req).await)
        }
        (Method::POST, ["api", "spaces", space_id, "join"]) => {
            let space_id = space_id.to_string();
            to_boxed(routes::join_space(Arc::clone(&state), &space_id, req).await)
        }
        (Method::POST, ["api", "spaces", space_id, "leave"]) => {
            let space_id = space_id.to_string();
            to_boxed(routes::leave_space(Arc::clone(&state), &space_id, req).await)
        }

        // ====================================================================
        // Analytics
        // ====================================================================
        (Method::GET, ["api", "analytics", "summary"]) => {
            to_boxed(routes::platform_summary(Arc::clone(&state)).await)
        }

        _ => to_boxed(not_found_response(&path)),
    };

    Ok(response)
}

fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
