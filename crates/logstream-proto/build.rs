// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use tonic_build::manual::{Builder, Method, Service};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Messages are hand-written prost types in src/lib.rs, so only the service
    // stubs are generated here and no protoc is needed on the build host.
    let log_streamer = Service::builder()
        .name("LogStreamer")
        .package("logstream")
        .method(
            Method::builder()
                .name("stream_log")
                .route_name("StreamLog")
                .input_type("crate::LogStreamRequest")
                .output_type("crate::LogStreamResponse")
                .codec_path("tonic::codec::ProstCodec")
                .build(),
        )
        .build();

    Builder::new().compile(&[log_streamer]);
}
