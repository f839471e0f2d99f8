pub mod app;
pub mod builder;
pub mod config;
pub mod domain;
pub mod dot;
pub mod error;
pub mod investigation;
pub mod output;
pub mod resolver;
pub mod schema;
pub mod tokenizer;
pub mod validator;
pub mod warning;
pub mod writer;
