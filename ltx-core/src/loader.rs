use std::future::Future;

use anyhow::Result;
use hf_hub::api::tokio::Api;

use crate::{loader_factory::ModelVariant, DeviceMap, PipelineOptions, VideoModel};

pub trait Loader {
    type Model: VideoModel;

    fn load(
        repo_id: &str,
        variant: ModelVariant,
        api: Api,
        device_map: DeviceMap,
        options: PipelineOptions,
    ) -> impl Future<Output = Result<Self::Model>>
    where
        Self: Sized;
}
