#![allow(dead_code)]

use async_trait::async_trait;
use image_import::error::{ImportError, Result};
use image_import::image::{DigestRegistry, Image};
use image_import::registry::{FetchedManifest, ManifestFetcher};
use std::collections::HashMap;
use std::time::Duration;

pub const LAYER_DIGEST: &str =
    "sha256:d9d352c11bbd3880007953ed6eec1cbace76898828f3434984a0ca60672fdf5a";
pub const LAYER_SIZE: u64 = 29715337;
pub const OCI_MANIFEST_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

/// Single-layer OCI manifest and the config text stored with it. The config
/// descriptor names `sha256:bf16bd...`, which is not the digest of this text.
pub const SINGLE_LAYER_MANIFEST: &str = include_str!("../fixtures/oci_single_layer_manifest.json");
pub const SINGLE_LAYER_CONFIG: &str = include_str!("../fixtures/oci_single_layer_config.json");

pub const UBUNTU_CONFIG: &str = r##"{
    "architecture": "amd64",
    "config": {
        "Hostname": "",
        "User": "",
        "Env": ["PATH=/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin"],
        "Cmd": ["/bin/bash"],
        "Image": "sha256:825befda5d2b1a76b71f4e1d6d31f5d82d4488b8337b1ad42e29b1340d766647",
        "Volumes": null,
        "Entrypoint": null,
        "Labels": {
            "org.opencontainers.image.ref.name": "ubuntu",
            "org.opencontainers.image.version": "24.04"
        }
    },
    "container": "57d2303e19c80641e487894fdb01e8e26ab42726f45e72624efe9d812e1c8889",
    "container_config": {
        "Hostname": "57d2303e19c8",
        "Cmd": ["/bin/sh", "-c", "#(nop) ", "CMD [\"/bin/bash\"]"],
        "Image": "sha256:825befda5d2b1a76b71f4e1d6d31f5d82d4488b8337b1ad42e29b1340d766647"
    },
    "created": "2025-05-29T04:21:01.971275965Z",
    "docker_version": "24.0.7",
    "history": [
        {
            "created": "2025-05-29T04:20:59.390476489Z",
            "created_by": "/bin/sh -c #(nop)  ARG RELEASE",
            "empty_layer": true
        },
        {
            "created": "2025-05-29T04:21:01.6549815Z",
            "created_by": "/bin/sh -c #(nop) ADD file:598ca0108009b5c2e9e6f4fc4bd19a6bcd604fccb5b9376fac14a75522a5cfa3 in / "
        }
    ],
    "os": "linux",
    "rootfs": {
        "type": "layers",
        "diff_ids": ["sha256:a8346d259389bc6221b4f3c61bad4e48087c5b82308e8f53ce703cfc8333c7b3"]
    }
}"##;

/// Single-layer OCI manifest whose config descriptor is bound to `config`
pub fn oci_manifest(config: &str, layers: &[(&str, u64)]) -> String {
    let layers: Vec<String> = layers
        .iter()
        .map(|(digest, size)| {
            format!(
                r#"{{"mediaType":"application/vnd.oci.image.layer.v1.tar+gzip","size":{},"digest":"{}"}}"#,
                size, digest
            )
        })
        .collect();
    format!(
        r#"{{
    "schemaVersion": 2,
    "mediaType": "application/vnd.oci.image.manifest.v1+json",
    "config": {{
        "mediaType": "application/vnd.oci.image.config.v1+json",
        "size": {},
        "digest": "{}"
    }},
    "layers": [{}]
}}"#,
        config.len(),
        DigestRegistry::sha256(config.as_bytes()),
        layers.join(",")
    )
}

pub fn ubuntu_manifest() -> String {
    oci_manifest(UBUNTU_CONFIG, &[(LAYER_DIGEST, LAYER_SIZE)])
}

pub fn manifest_list(entries: &[(&str, &str, &str)]) -> String {
    let manifests: Vec<String> = entries
        .iter()
        .map(|(digest, os, architecture)| {
            format!(
                r#"{{"mediaType":"application/vnd.oci.image.manifest.v1+json","size":500,"digest":"{}","platform":{{"os":"{}","architecture":"{}"}}}}"#,
                digest, os, architecture
            )
        })
        .collect();
    format!(
        r#"{{"schemaVersion":2,"mediaType":"application/vnd.oci.image.index.v1+json","manifests":[{}]}}"#,
        manifests.join(",")
    )
}

/// An image record named by its manifest digest
pub fn image_for(manifest: &str, config: &str, reference: &str) -> Image {
    let mut image = Image::default();
    image.metadata.name = DigestRegistry::sha256(manifest.as_bytes()).to_string();
    image.docker_image_reference = reference.to_string();
    image.docker_image_manifest_media_type = OCI_MANIFEST_TYPE.to_string();
    image.docker_image_manifest = manifest.to_string();
    image.docker_image_config = config.to_string();
    image
}

/// In-process registry stand-in keyed by digest
#[derive(Default)]
pub struct FakeFetcher {
    pub manifests: HashMap<String, String>,
    pub blobs: HashMap<String, String>,
    pub delay: Option<Duration>,
}

impl FakeFetcher {
    pub fn with_manifest(mut self, content: &str) -> Self {
        let digest = DigestRegistry::sha256(content.as_bytes()).to_string();
        self.manifests.insert(digest, content.to_string());
        self
    }

    pub fn with_blob(mut self, content: &str) -> Self {
        let digest = DigestRegistry::sha256(content.as_bytes()).to_string();
        self.blobs.insert(digest, content.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ManifestFetcher for FakeFetcher {
    async fn fetch_manifest(&self, digest: &str) -> Result<FetchedManifest> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let content = self
            .manifests
            .get(digest)
            .ok_or_else(|| ImportError::Fetch(format!("manifest {} not found", digest)))?;
        Ok(FetchedManifest {
            media_type: OCI_MANIFEST_TYPE.to_string(),
            content: content.clone(),
        })
    }

    async fn fetch_blob(&self, digest: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(digest)
            .map(|b| b.as_bytes().to_vec())
            .ok_or_else(|| ImportError::Fetch(format!("blob {} not found", digest)))
    }
}
