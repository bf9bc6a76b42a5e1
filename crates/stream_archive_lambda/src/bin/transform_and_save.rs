use aws_sdk_s3::primitives::ByteStream;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use stream_archive_lambda::adapters::object_store::ObjectStore;
use stream_archive_lambda::handlers::transform::{handle_stream_event, TransformConfig};
use stream_archive_lambda::logging::init_json_logging;
use stream_archive_lambda::runtime::contract::InvocationResult;

const JSON_CONTENT_TYPE: &str = "application/json";

struct S3ObjectStore {
    bucket: String,
    s3_client: aws_sdk_s3::Client,
}

impl ObjectStore for S3ObjectStore {
    fn write_object(&self, key: &str, body: &[u8]) -> Result<(), String> {
        let bucket = self.bucket.clone();
        let object_key = key.to_string();
        let body_bytes = body.to_vec();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .put_object()
                    .bucket(bucket)
                    .key(object_key)
                    .content_type(JSON_CONTENT_TYPE)
                    .body(ByteStream::from(body_bytes))
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to write object to s3: {error}"))
            })
        })
    }
}

struct RuntimeDependencies {
    config: TransformConfig,
    store: S3ObjectStore,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<InvocationResult, Error> {
    Ok(handle_stream_event(event.payload, &deps.config, &deps.store))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_json_logging().map_err(Error::from)?;

    let config = TransformConfig::from_env().map_err(Error::from)?;
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let deps = RuntimeDependencies {
        store: S3ObjectStore {
            bucket: config.bucket.clone(),
            s3_client: aws_sdk_s3::Client::new(&aws_config),
        },
        config,
    };

    let deps = &deps;
    lambda_runtime::run(service_fn(move |event| handle_request(event, deps))).await
}
