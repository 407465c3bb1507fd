//! Infrastructure layer
//!
//! ドメイン層のポートを実装するアダプター（インメモリ / Redis）と、
//! インスタンス内の接続管理・ブロードキャスト・認可・トラフィック監視を提供します。

pub mod auth;
pub mod broadcaster;
pub mod broker;
pub mod dto;
pub mod queue;
pub mod registry;
pub mod repository;
pub mod store;
pub mod traffic;
