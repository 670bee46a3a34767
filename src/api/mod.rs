pub mod v1;

use crate::server::Server;
use std::sync::Arc;
use warp::Filter;

/// Everything served under `/api/v1`, with rejections turned into JSON replies.
pub fn filter(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
    let cookies = v1::CookiePolicy {
        secure: server.secure_cookies,
    };

    warp::path("api")
        .and(warp::path("v1"))
        .and(v1::routes(server, cookies))
        .recover(move |err: warp::Rejection| v1::recover_error(err, cookies))
        .unify()
        .with(warp::trace::request())
}
