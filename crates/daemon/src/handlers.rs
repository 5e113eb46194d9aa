use std::{convert::Infallible, sync::Arc};

use axum::{
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use scaled_proto::{
    QueueStatus, ScaleFactorResponse, ScreenScaleFactorsResponse, SetScaleFactorRequest,
    SetScreenScaleFactorsRequest,
};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};
use tracing::{info, warn};

use crate::{errors::ScaleError, manager::ScaleManager, notifier::BroadcastNotifier};

/// Manager calls do file I/O, so they run on the blocking pool.
async fn blocking<T, F>(manager: Arc<ScaleManager>, call: F) -> Result<T, ScaleError>
where
    F: FnOnce(&ScaleManager) -> Result<T, ScaleError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || call(&manager)).await?
}

pub async fn set_scale_factor(
    Extension(manager): Extension<Arc<ScaleManager>>,
    Json(req): Json<SetScaleFactorRequest>,
) -> Result<StatusCode, ScaleError> {

    info!("set scale factor: {}", req.scale);
    blocking(manager, move |m| m.set_scale_factor(req.scale)).await?;
    Ok(StatusCode::OK)
}

pub async fn set_scale_factor_silent(
    Extension(manager): Extension<Arc<ScaleManager>>,
    Json(req): Json<SetScaleFactorRequest>,
) -> Result<StatusCode, ScaleError> {

    info!("set scale factor without notify: {}", req.scale);
    blocking(manager, move |m| m.set_scale_factor_without_notify(req.scale)).await?;
    Ok(StatusCode::OK)
}

pub async fn get_scale_factor(
    Extension(manager): Extension<Arc<ScaleManager>>,
) -> Result<Json<ScaleFactorResponse>, ScaleError> {
    let scale = blocking(manager, |m| m.get_scale_factor()).await?;
    Ok(Json(ScaleFactorResponse { scale }))
}

pub async fn set_screen_scale_factors(
    Extension(manager): Extension<Arc<ScaleManager>>,
    Json(req): Json<SetScreenScaleFactorsRequest>,
) -> Result<StatusCode, ScaleError> {

    info!("set screen scale factors: {:?}", req.factors);
    blocking(manager, move |m| m.set_screen_scale_factors(req.factors, true)).await?;
    Ok(StatusCode::OK)
}

pub async fn get_screen_scale_factors(
    Extension(manager): Extension<Arc<ScaleManager>>,
) -> Result<Json<ScreenScaleFactorsResponse>, ScaleError> {
    let factors = blocking(manager, |m| m.get_screen_scale_factors()).await?;
    Ok(Json(ScreenScaleFactorsResponse { factors }))
}

pub async fn get_status(Extension(manager): Extension<Arc<ScaleManager>>) -> Json<QueueStatus> {
    Json(manager.queue().status())
}

/// Server-sent stream of `SetScaleFactorStarted` / `SetScaleFactorDone`.
pub async fn events(
    Extension(notifier): Extension<BroadcastNotifier>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(notifier.subscribe()).filter_map(|msg| match msg {
        Ok(signal) => Some(Ok(Event::default().event(signal.name()).data(signal.name()))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!("events subscriber lagged, skipped {} signals", skipped);
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
