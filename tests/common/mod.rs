//! Helpers shared by the integration tests: a scratch directory with crafted metadata images
//! and an isolated cache.
#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use dotbind::{
    cache::{CacheConfig, MetadataCache},
    compilation::CompilationOptions,
    metadata::{identity::AssemblyIdentity, MetadataImageBuilder},
};
use tempfile::TempDir;

pub struct Fixture {
    pub dir: TempDir,
    pub cache: Arc<MetadataCache>,
}

impl Fixture {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        Fixture {
            dir: tempfile::tempdir().unwrap(),
            cache: MetadataCache::new(CacheConfig::manual()),
        }
    }

    pub fn options(&self) -> CompilationOptions {
        CompilationOptions::default().with_cache(self.cache.clone())
    }

    /// Write a single-module assembly named after the simple name of `identity`
    pub fn assembly(&self, identity: &str, references: &[&str]) -> PathBuf {
        self.assembly_in("", identity, references)
    }

    /// Like [`Fixture::assembly`], in the subdirectory `subdir`
    pub fn assembly_in(&self, subdir: &str, identity: &str, references: &[&str]) -> PathBuf {
        let identity = AssemblyIdentity::parse(identity).unwrap();
        let dir = self.dir.path().join(subdir);
        std::fs::create_dir_all(&dir).unwrap();

        let path = dir.join(format!("{}.dll", identity.name));
        let mut builder = MetadataImageBuilder::new()
            .module(format!("{}.dll", identity.name))
            .assembly(identity);
        for reference in references {
            builder = builder.assembly_ref(AssemblyIdentity::parse(reference).unwrap());
        }
        builder.write_to(&path).unwrap();
        path
    }

    /// Write a netmodule
    pub fn netmodule(&self, name: &str, references: &[&str]) -> PathBuf {
        let path = self.dir.path().join(name);
        let mut builder = MetadataImageBuilder::new().module(name);
        for reference in references {
            builder = builder.assembly_ref(AssemblyIdentity::parse(reference).unwrap());
        }
        builder.write_to(&path).unwrap();
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

pub fn names(symbols: &[dotbind::symbols::AssemblySymbol]) -> Vec<String> {
    symbols.iter().map(|symbol| symbol.name().to_string()).collect()
}
