mod codec_proptest;
mod scheduler;
mod selection;
mod status;
