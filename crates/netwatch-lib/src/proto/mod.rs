//! Generated protobuf code
//!
//! This module contains the Rust code for `proto/metrics.proto`.
//! With the `proto-gen` feature the code is generated at build time by
//! tonic-build; otherwise the checked-in definitions below are used.

#[cfg(feature = "proto-gen")]
pub mod metrics {
    tonic::include_proto!("metrics");
}

#[cfg(not(feature = "proto-gen"))]
pub mod metrics {
    use prost::Message;

    #[derive(Clone, PartialEq, Message)]
    pub struct MetricsRequest {
        #[prost(string, tag = "1")]
        pub node_id: String,
        #[prost(double, tag = "2")]
        pub latency: f64,
        #[prost(double, tag = "3")]
        pub jitter: f64,
        #[prost(double, tag = "4")]
        pub packet_loss: f64,
        #[prost(double, tag = "5")]
        pub bandwidth: f64,
        #[prost(int64, tag = "6")]
        pub timestamp: i64,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct MetricsResponse {
        #[prost(bool, tag = "1")]
        pub success: bool,
        #[prost(string, tag = "2")]
        pub message: String,
        #[prost(bool, tag = "3")]
        pub is_latency_spike: bool,
        #[prost(bool, tag = "4")]
        pub is_packet_loss: bool,
        #[prost(double, tag = "5")]
        pub z_score: f64,
        #[prost(enumeration = "ErrorKind", tag = "6")]
        pub error_kind: i32,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum ErrorKind {
        Unspecified = 0,
        Validation = 1,
        Storage = 2,
        Timeout = 3,
    }

    impl ErrorKind {
        pub fn as_str_name(&self) -> &'static str {
            match self {
                ErrorKind::Unspecified => "ERROR_KIND_UNSPECIFIED",
                ErrorKind::Validation => "ERROR_KIND_VALIDATION",
                ErrorKind::Storage => "ERROR_KIND_STORAGE",
                ErrorKind::Timeout => "ERROR_KIND_TIMEOUT",
            }
        }
    }

    pub mod metrics_service_client {
        #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
        use tonic::codegen::http::Uri;
        use tonic::codegen::*;

        #[derive(Debug, Clone)]
        pub struct MetricsServiceClient<T> {
            inner: tonic::client::Grpc<T>,
        }

        impl MetricsServiceClient<tonic::transport::Channel> {
            pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
            where
                D: TryInto<tonic::transport::Endpoint>,
                D::Error: Into<StdError>,
            {
                let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
                Ok(Self::new(conn))
            }
        }

        impl<T> MetricsServiceClient<T>
        where
            T: tonic::client::GrpcService<tonic::body::BoxBody>,
            T::Error: Into<StdError>,
            T::ResponseBody: Body<Data = Bytes> + Send + 'static,
            <T::ResponseBody as Body>::Error: Into<StdError> + Send,
        {
            pub fn new(inner: T) -> Self {
                let inner = tonic::client::Grpc::new(inner);
                Self { inner }
            }

            pub fn with_origin(inner: T, origin: Uri) -> Self {
                let inner = tonic::client::Grpc::with_origin(inner, origin);
                Self { inner }
            }

            pub async fn submit_metrics(
                &mut self,
                request: impl tonic::IntoRequest<super::MetricsRequest>,
            ) -> Result<tonic::Response<super::MetricsResponse>, tonic::Status> {
                self.inner.ready().await.map_err(|e| {
                    tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {}", e.into()),
                    )
                })?;
                let codec = tonic::codec::ProstCodec::default();
                let path =
                    http::uri::PathAndQuery::from_static("/metrics.MetricsService/SubmitMetrics");
                self.inner.unary(request.into_request(), path, codec).await
            }
        }
    }

    pub mod metrics_service_server {
        #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
        use tonic::codegen::*;

        #[async_trait]
        pub trait MetricsService: Send + Sync + 'static {
            async fn submit_metrics(
                &self,
                request: tonic::Request<super::MetricsRequest>,
            ) -> std::result::Result<tonic::Response<super::MetricsResponse>, tonic::Status>;
        }

        #[derive(Debug)]
        pub struct MetricsServiceServer<T: MetricsService> {
            inner: _Inner<T>,
            accept_compression_encodings: EnabledCompressionEncodings,
            send_compression_encodings: EnabledCompressionEncodings,
            max_decoding_message_size: Option<usize>,
            max_encoding_message_size: Option<usize>,
        }

        struct _Inner<T>(Arc<T>);

        impl<T: MetricsService> MetricsServiceServer<T> {
            pub fn new(inner: T) -> Self {
                Self::from_arc(Arc::new(inner))
            }

            pub fn from_arc(inner: Arc<T>) -> Self {
                let inner = _Inner(inner);
                Self {
                    inner,
                    accept_compression_encodings: Default::default(),
                    send_compression_encodings: Default::default(),
                    max_decoding_message_size: None,
                    max_encoding_message_size: None,
                }
            }

            pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
                self.max_decoding_message_size = Some(limit);
                self
            }
        }

        impl<T, B> tonic::codegen::Service<http::Request<B>> for MetricsServiceServer<T>
        where
            T: MetricsService,
            B: Body + Send + 'static,
            B::Error: Into<StdError> + Send + 'static,
        {
            type Response = http::Response<tonic::body::BoxBody>;
            type Error = std::convert::Infallible;
            type Future = BoxFuture<Self::Response, Self::Error>;

            fn poll_ready(
                &mut self,
                _cx: &mut Context<'_>,
            ) -> Poll<std::result::Result<(), Self::Error>> {
                Poll::Ready(Ok(()))
            }

            fn call(&mut self, req: http::Request<B>) -> Self::Future {
                let inner = self.inner.clone();
                match req.uri().path() {
                    "/metrics.MetricsService/SubmitMetrics" => {
                        #[allow(non_camel_case_types)]
                        struct SubmitMetricsSvc<T: MetricsService>(pub Arc<T>);
                        impl<T: MetricsService> tonic::server::UnaryService<super::MetricsRequest>
                            for SubmitMetricsSvc<T>
                        {
                            type Response = super::MetricsResponse;
                            type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                            fn call(
                                &mut self,
                                request: tonic::Request<super::MetricsRequest>,
                            ) -> Self::Future {
                                let inner = Arc::clone(&self.0);
                                let fut = async move { (*inner).submit_metrics(request).await };
                                Box::pin(fut)
                            }
                        }
                        let accept_compression_encodings = self.accept_compression_encodings;
                        let send_compression_encodings = self.send_compression_encodings;
                        let max_decoding_message_size = self.max_decoding_message_size;
                        let max_encoding_message_size = self.max_encoding_message_size;
                        let fut = async move {
                            let inner = inner.0;
                            let method = SubmitMetricsSvc(inner);
                            let codec = tonic::codec::ProstCodec::default();
                            let mut grpc = tonic::server::Grpc::new(codec)
                                .apply_compression_config(
                                    accept_compression_encodings,
                                    send_compression_encodings,
                                )
                                .apply_max_message_size_config(
                                    max_decoding_message_size,
                                    max_encoding_message_size,
                                );
                            let res = grpc.unary(method, req).await;
                            Ok(res)
                        };
                        Box::pin(fut)
                    }
                    _ => Box::pin(async move {
                        Ok(http::Response::builder()
                            .status(200)
                            .header("grpc-status", "12")
                            .header("content-type", "application/grpc")
                            .body(empty_body())
                            .unwrap())
                    }),
                }
            }
        }

        impl<T: MetricsService> Clone for MetricsServiceServer<T> {
            fn clone(&self) -> Self {
                let inner = self.inner.clone();
                Self {
                    inner,
                    accept_compression_encodings: self.accept_compression_encodings,
                    send_compression_encodings: self.send_compression_encodings,
                    max_decoding_message_size: self.max_decoding_message_size,
                    max_encoding_message_size: self.max_encoding_message_size,
                }
            }
        }

        impl<T: MetricsService> Clone for _Inner<T> {
            fn clone(&self) -> Self {
                Self(Arc::clone(&self.0))
            }
        }

        impl<T: std::fmt::Debug> std::fmt::Debug for _Inner<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:?}", self.0)
            }
        }

        impl<T: MetricsService> tonic::server::NamedService for MetricsServiceServer<T> {
            const NAME: &'static str = "metrics.MetricsService";
        }
    }
}

pub use metrics::metrics_service_client::MetricsServiceClient;
pub use metrics::metrics_service_server::{MetricsService, MetricsServiceServer};
pub use metrics::*;
