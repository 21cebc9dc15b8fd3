mod chunking;
mod config;
mod navigation;
mod parsing;
