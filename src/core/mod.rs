pub mod container;
pub mod direct_downloader;
pub mod extractor;
pub mod ffmpeg;
pub mod http_client;
pub mod process;
pub mod redirect;
pub mod registry;
pub mod reporter;
pub mod url_parser;
pub mod worker;
pub mod ytdlp;
