/*!
 * Synthetic AGF containers for integration tests
 *
 * Builds containers the same way an export would: geometry blobs in XML,
 * gzip, zero padding to the block size, AES-128-CBC under the key derived
 * from the manifest UUID, and a ZIP with the manifest beside the payload.
 */

#![allow(dead_code)]

use aes::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use flate2::write::GzEncoder;
use flate2::Compression;
use furrow::crypto::{derive_key, BLOCK_SIZE};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

pub const UUID: &str = "0f3c2a91-7d44-4b1e-9a6f-21c5e8d0b7a3";
pub const IV: [u8; BLOCK_SIZE] = [
    0x10, 0x32, 0x54, 0x76, 0x98, 0xba, 0xdc, 0xfe, 0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef,
];
pub const ENTRY: &str = "boundary_data.bin";

const A: f64 = 6_378_137.0;
const INV_F: f64 = 298.257_223_563;

/// WGS84 geodetic (degrees) to ECEF metres at zero height
pub fn ecef(lon: f64, lat: f64) -> [f64; 3] {
    let f = 1.0 / INV_F;
    let e2 = f * (2.0 - f);
    let (lon, lat) = (lon.to_radians(), lat.to_radians());
    let n = A / (1.0 - e2 * lat.sin().powi(2)).sqrt();
    [
        n * lat.cos() * lon.cos(),
        n * lat.cos() * lon.sin(),
        n * (1.0 - e2) * lat.sin(),
    ]
}

/// Four corners of a square field with its south-west corner at (lon, lat)
pub fn field(lon: f64, lat: f64, size: f64) -> Vec<[f64; 3]> {
    vec![
        ecef(lon, lat),
        ecef(lon + size, lat),
        ecef(lon + size, lat + size),
        ecef(lon, lat + size),
    ]
}

fn push_points(out: &mut Vec<u8>, points: &[[f64; 3]]) {
    out.extend_from_slice(&(points.len() as i32).to_le_bytes());
    for p in points {
        for v in p {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
}

/// Tag 3 blob: one polygon ring
pub fn polygon_blob(points: &[[f64; 3]]) -> String {
    let mut out = vec![3u8];
    push_points(&mut out, points);
    base64::engine::general_purpose::STANDARD.encode(out)
}

/// Tag 4 blob; every part is prefixed with the nested polygon tag
pub fn multi_polygon_blob(parts: &[Vec<[f64; 3]>]) -> String {
    let mut out = vec![4u8];
    out.extend_from_slice(&(parts.len() as i32).to_le_bytes());
    for part in parts {
        out.push(3);
        push_points(&mut out, part);
    }
    base64::engine::general_purpose::STANDARD.encode(out)
}

/// Document with one `<field_extent>` per blob
pub fn field_extent_document(blobs: &[String]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?><farm>");
    for (i, blob) in blobs.iter().enumerate() {
        xml.push_str(&format!(
            "<field id=\"{}\"><name>Field {}</name><field_extent>{}</field_extent></field>",
            i, i, blob
        ));
    }
    xml.push_str("</farm>");
    xml
}

pub fn manifest_xml(uuid: &str, iv_hex: &str, entry: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?><export><info><uuid>{}</uuid><iv>{}</iv><entry>{}</entry></info></export>",
        uuid, iv_hex, entry
    )
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Zero-pad to the block size and encrypt under the key for `uuid`
pub fn encrypt(plaintext: &[u8], uuid: &str, iv: &[u8; BLOCK_SIZE]) -> Vec<u8> {
    let key = derive_key(uuid).unwrap();
    let padded_len = plaintext.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    let mut buffer = plaintext.to_vec();
    buffer.resize(padded_len, 0);
    Aes128CbcEnc::new(key.as_bytes().into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(&mut buffer, padded_len)
        .unwrap()
        .to_vec()
}

/// Encrypted payload for an XML document
pub fn payload(xml: &str) -> Vec<u8> {
    payload_bytes(xml.as_bytes())
}

/// Encrypted payload for a document already encoded to bytes
pub fn payload_bytes(document: &[u8]) -> Vec<u8> {
    encrypt(&gzip(document), UUID, &IV)
}

/// Write a ZIP at `path` holding the given entries
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

/// Write a well-formed container for `xml` at `dir/name`
pub fn write_container(dir: &Path, name: &str, xml: &str) -> PathBuf {
    write_container_bytes(dir, name, xml.as_bytes())
}

/// Like [`write_container`] for a document in any encoding
pub fn write_container_bytes(dir: &Path, name: &str, document: &[u8]) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    let manifest = manifest_xml(UUID, &hex::encode(IV), ENTRY);
    let entry = format!("Export/Data/{}", ENTRY);
    let data = payload_bytes(document);
    write_zip(
        &path,
        &[
            ("Export/manifest.xml", manifest.as_bytes()),
            (entry.as_str(), data.as_slice()),
        ],
    );
    path
}
