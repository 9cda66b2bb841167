use lambda_runtime::{handler_fn, Context, Error};
use podfeed_cloud::aws::S3Store;
use podfeed_cloud::event::{self, Request};
use podfeed_cloud::{util, FeedLog};
use rusoto_core::Region;
use serde::Serialize;
use simple_error::SimpleResult;

#[derive(Serialize)]
struct Response {
    request_id: String,
    feeds: FeedLog,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    util::init_log();

    lambda_runtime::run(handler_fn(write_feeds)).await?;
    Ok(())
}

async fn write_feeds(req: Request, ctx: Context) -> SimpleResult<Response> {
    for r in &req.records {
        log::debug!("{:?}", r);
    }
    let rs_region = event::region(&req).parse::<Region>().unwrap_or(Region::EuWest1);
    let store = S3Store::new(rs_region);
    let feeds = event::handle(&store, &req).await.map_err(util::to_simple)?;

    Ok(Response {
        request_id: ctx.request_id,
        feeds,
    })
}
