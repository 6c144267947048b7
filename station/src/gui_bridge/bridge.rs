use crate::gui_bridge::model::{SaveRequest, SetupRequest, StatusReply};
use crate::workflow::runner::Runner;
use liftcore::model::FlowConditions;
use liftcore::pipeline::DisplayOptions;
use log::{info, warn};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::{MethodNotAllowed, Rejection};
use warp::reply::{Json, WithStatus};
use warp::Filter;

type Reply = WithStatus<Json>;

fn respond(action: &str, outcome: anyhow::Result<()>) -> Reply {
    match outcome {
        Ok(()) => warp::reply::with_status(
            warp::reply::json(&StatusReply::ok(format!("{action} accepted"))),
            StatusCode::OK,
        ),
        Err(err) => {
            warn!("{action} rejected: {err:#}");
            warp::reply::with_status(
                warp::reply::json(&StatusReply::error(format!("{err:#}"))),
                StatusCode::BAD_REQUEST,
            )
        }
    }
}

/// Runs a blocking runner action off the async executor.
async fn blocking<F>(action: &'static str, runner: Arc<Runner>, work: F) -> Result<Reply, Infallible>
where
    F: FnOnce(&Runner) -> anyhow::Result<()> + Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(move || work(&runner))
        .await
        .unwrap_or_else(|err| Err(anyhow::anyhow!("{action} task failed: {err}")));
    Ok(respond(action, outcome))
}

/// Answers unmatched routes and unreadable bodies in the same
/// `{status, message}` shape as rejected actions.
async fn rejection_reply(rejection: Rejection) -> Result<Reply, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "no such route".to_string())
    } else if let Some(err) = rejection.find::<BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("malformed request body: {err}"))
    } else if rejection.find::<MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        (StatusCode::BAD_REQUEST, format!("request rejected: {rejection:?}"))
    };
    warn!("{message}");
    Ok(warp::reply::with_status(
        warp::reply::json(&StatusReply::error(message)),
        status,
    ))
}

/// HTTP surface the visualizer talks to: the latest frame plus operator controls.
pub struct GuiBridge {
    runner: Arc<Runner>,
}

impl GuiBridge {
    pub fn new(runner: Arc<Runner>) -> Self {
        Self { runner }
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (Reply,), Error = Infallible> + Clone + Send + Sync + 'static
    {
        let runner = Arc::clone(&self.runner);
        let runner_filter = warp::any().map(move || Arc::clone(&runner));

        let frame_route = warp::path("frame")
            .and(warp::path::end())
            .and(warp::get())
            .and(runner_filter.clone())
            .map(|runner: Arc<Runner>| match runner.frame() {
                Some(frame) => warp::reply::with_status(warp::reply::json(&*frame), StatusCode::OK),
                None => warp::reply::with_status(
                    warp::reply::json(&StatusReply::error("no frame rendered yet")),
                    StatusCode::NOT_FOUND,
                ),
            });

        let display_route = warp::path("display")
            .and(warp::post())
            .and(warp::body::json())
            .and(runner_filter.clone())
            .map(|options: DisplayOptions, runner: Arc<Runner>| {
                runner.set_display(options);
                respond("display", Ok(()))
            });

        let flow_route = warp::path("flow")
            .and(warp::post())
            .and(warp::body::json())
            .and(runner_filter.clone())
            .and_then(|flow: FlowConditions, runner: Arc<Runner>| {
                blocking("flow", runner, move |runner| runner.update_flow(flow))
            });

        let setup_route = warp::path("setup")
            .and(warp::post())
            .and(warp::body::json())
            .and(runner_filter.clone())
            .and_then(|request: SetupRequest, runner: Arc<Runner>| {
                blocking("setup", runner, move |runner| runner.setup(request))
            });

        let start_route = warp::path("start")
            .and(warp::post())
            .and(runner_filter.clone())
            .and_then(|runner: Arc<Runner>| blocking("start", runner, |runner| runner.start()));

        let stop_route = warp::path("stop")
            .and(warp::post())
            .and(runner_filter.clone())
            .and_then(|runner: Arc<Runner>| blocking("stop", runner, |runner| runner.stop()));

        let save_route = warp::path("save")
            .and(warp::post())
            .and(warp::body::json())
            .and(runner_filter)
            .and_then(|request: SaveRequest, runner: Arc<Runner>| {
                blocking("save", runner, move |runner| runner.save(request.samples))
            });

        frame_route
            .or(display_route)
            .unify()
            .or(flow_route)
            .unify()
            .or(setup_route)
            .unify()
            .or(start_route)
            .unify()
            .or(stop_route)
            .unify()
            .or(save_route)
            .unify()
            .recover(rejection_reply)
            .unify()
    }

    pub async fn serve(self, address: SocketAddr) {
        info!("display bridge listening on http://{address}");
        warp::serve(self.routes()).run(address).await;
    }
}
