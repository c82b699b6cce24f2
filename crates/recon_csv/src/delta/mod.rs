//! Delta compression between CSV snapshots: change detection, delta
//! record codecs, artifact I/O, and reconstruction.

// modules
mod codec;
mod compress;
mod config;
mod detect;
mod record;

// exports
pub use codec::{
    decode_records, delta_decode_integers, delta_encode_integers, deserialize_records,
    dictionary_decode, dictionary_encode, encode_records, hybrid_decode, hybrid_encode,
    lz77_compress, lz77_decompress, rle_decode, rle_encode, serialize_records,
};
pub use compress::{DeltaCompressor, DeltaDecompressor};
pub use config::DeltaConfig;
pub use detect::{row_key, ChangeDetector};
pub use record::{DeltaAlgorithm, DeltaHeader, DeltaOperation, DeltaRecord, DetectionMode};
