//! Binding the references of a compilation.
//!
//! Binding runs once per compilation, in these steps:
//!
//! 1. referenced compilations are bound first
//! 2. file references are loaded through the metadata cache, optionally in parallel
//! 3. later assembly references supersede earlier references to the same assembly
//! 4. dependencies nothing provides are handed to the missing assembly resolver
//! 5. the core library is chosen
//! 6. every `AssemblyRef` of every module in scope is bound to a referenced assembly
//! 7. for every referenced assembly a symbol is reused if one with the same bindings is alive,
//!    otherwise a new one is created and bound
//!
//! Steps 6 and 7 operate on "targets": the source assembly at index 0, followed by the
//! surviving explicit assembly references and the implicit references, in order.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    path::PathBuf,
    sync::Arc,
};

use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::{
    cache::MetadataCache,
    compilation::{
        manager::{BoundReferences, ReferenceBinding, ReferenceManager},
        Compilation, DiagnosticKind, Diagnostics, ImageMetadata, MetadataReference,
        MissingAssemblyResolver,
    },
    file::FileKey,
    metadata::{identity::AssemblyIdentity, AssemblyMetadata, MetadataImageKind, ModuleMetadata},
    symbols::{
        AssemblyLink, AssemblySymbol, MissingAssemblySymbol, ModuleSymbol, PeAssemblySymbol,
        RetargetingAssemblySymbol, SourceAssemblySymbol,
    },
    Error,
};

/// Alias standing for the global namespace when merging aliases
const GLOBAL_ALIAS: &str = "global";

/// Where the assembly of a target comes from
#[derive(Clone)]
enum TargetSource {
    /// The compilation being bound
    Consumer,
    File {
        key: FileKey,
        metadata: Arc<AssemblyMetadata>,
    },
    Image {
        reference: Arc<MetadataReference>,
        metadata: Arc<AssemblyMetadata>,
    },
    Compilation {
        compilation: Arc<Compilation>,
        assembly: Arc<SourceAssemblySymbol>,
    },
}

impl TargetSource {
    fn identity(&self) -> Option<&AssemblyIdentity> {
        match self {
            TargetSource::Consumer => None,
            TargetSource::File { metadata, .. } | TargetSource::Image { metadata, .. } => {
                Some(metadata.identity())
            }
            TargetSource::Compilation { assembly, .. } => Some(assembly.identity()),
        }
    }

    /// The `AssemblyRef`s of every module, in module order
    fn module_references(&self) -> Vec<Vec<AssemblyIdentity>> {
        match self {
            TargetSource::Consumer => Vec::new(),
            TargetSource::File { metadata, .. } | TargetSource::Image { metadata, .. } => metadata
                .modules()
                .iter()
                .map(|module| module.assembly_references().to_vec())
                .collect(),
            TargetSource::Compilation { assembly, .. } => assembly
                .modules()
                .iter()
                .map(ModuleSymbol::referenced_assemblies)
                .collect(),
        }
    }

    /// Whether both describe the same loaded assembly
    fn is_same_assembly(&self, other: &TargetSource) -> bool {
        match (self, other) {
            (TargetSource::File { metadata: a, .. }, TargetSource::File { metadata: b, .. })
            | (TargetSource::Image { metadata: a, .. }, TargetSource::Image { metadata: b, .. })
            | (TargetSource::File { metadata: a, .. }, TargetSource::Image { metadata: b, .. })
            | (TargetSource::Image { metadata: a, .. }, TargetSource::File { metadata: b, .. }) => {
                Arc::ptr_eq(a, b)
            }
            (
                TargetSource::Compilation { compilation: a, .. },
                TargetSource::Compilation { compilation: b, .. },
            ) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

enum Loaded {
    Assembly(TargetSource),
    Module {
        metadata: Arc<ModuleMetadata>,
        key: Option<FileKey>,
    },
    Failed(ReferenceBinding),
}

fn load(reference: &Arc<MetadataReference>, cache: &MetadataCache) -> Loaded {
    match reference.as_ref() {
        MetadataReference::File { path, properties } => match properties.kind {
            MetadataImageKind::Assembly => match cache.get_or_load_assembly(path) {
                Ok(entry) => Loaded::Assembly(TargetSource::File {
                    key: entry.key,
                    metadata: entry.metadata,
                }),
                Err(error) => Loaded::Failed(ReferenceBinding::failed(path, error)),
            },
            MetadataImageKind::Module => match cache.get_or_load_module(path) {
                Ok(entry) => Loaded::Module {
                    metadata: entry.metadata,
                    key: Some(entry.key),
                },
                Err(error) => Loaded::Failed(ReferenceBinding::failed(path, error)),
            },
        },
        MetadataReference::Image { image, .. } => match image.metadata() {
            ImageMetadata::Assembly(metadata) => Loaded::Assembly(TargetSource::Image {
                reference: reference.clone(),
                metadata: metadata.clone(),
            }),
            ImageMetadata::Module(metadata) => Loaded::Module {
                metadata: metadata.clone(),
                key: None,
            },
        },
        MetadataReference::Compilation { compilation, .. } => {
            Loaded::Assembly(TargetSource::Compilation {
                compilation: compilation.clone(),
                assembly: compilation.assembly(),
            })
        }
    }
}

fn load_all(references: &[Arc<MetadataReference>], cache: &MetadataCache) -> Vec<Loaded> {
    // Workers can not take a cache lock the calling thread holds
    if cache.config().parallel_preload
        && references.len() > 1
        && !cache.is_locked_by_current_thread()
    {
        references
            .par_iter()
            .map(|reference| load(reference, cache))
            .collect()
    } else {
        references
            .iter()
            .map(|reference| load(reference, cache))
            .collect()
    }
}

fn report_failure(diagnostics: &Diagnostics, binding: &ReferenceBinding) {
    let ReferenceBinding::Failed { path, source } = binding else {
        return;
    };

    let kind = if source.is_not_found() {
        DiagnosticKind::MetadataFileNotFound
    } else {
        DiagnosticKind::MetadataReadError
    };
    warn!(path = %path.display(), error = %source, "failed to load metadata reference");
    diagnostics.report(kind, format!("{}: {}", path.display(), source));
}

fn merge_aliases(winner: &mut Vec<String>, other: &[String]) {
    if winner.is_empty() && other.is_empty() {
        return;
    }
    if winner.is_empty() {
        winner.push(GLOBAL_ALIAS.to_string());
    }

    let other = if other.is_empty() {
        vec![GLOBAL_ALIAS.to_string()]
    } else {
        other.to_vec()
    };
    for alias in other {
        if !winner.contains(&alias) {
            winner.push(alias);
        }
    }
}

#[derive(Clone)]
struct Target {
    source: TargetSource,
    identity: AssemblyIdentity,
    references: Vec<Vec<AssemblyIdentity>>,
    is_linked: bool,
}

impl Target {
    fn new(source: TargetSource, identity: AssemblyIdentity, is_linked: bool) -> Self {
        Target {
            references: source.module_references(),
            source,
            identity,
            is_linked,
        }
    }
}

#[derive(Clone, Copy)]
enum Corlib {
    Target(usize),
    Missing,
}

#[derive(Clone)]
enum Bound {
    Target(usize),
    Missing(Arc<MissingAssemblySymbol>),
}

/// Binds `AssemblyRef` identities to targets
struct IdentityBinder<'a> {
    targets: &'a [Target],
    diagnostics: &'a Diagnostics,
    missing: HashMap<AssemblyIdentity, Arc<MissingAssemblySymbol>>,
    unified: HashSet<(AssemblyIdentity, usize)>,
}

impl IdentityBinder<'_> {
    /// Bind `required`: an exact version match first, then the lowest higher version
    fn bind(&mut self, required: &AssemblyIdentity, referencing: &AssemblyIdentity) -> Bound {
        let mut unified: Option<usize> = None;
        for (index, target) in self.targets.iter().enumerate() {
            let candidate = &target.identity;
            if !candidate.can_unify_to(required) {
                continue;
            }
            if candidate.version == required.version {
                return Bound::Target(index);
            }
            let lower = |best: usize| candidate.version < self.targets[best].identity.version;
            if unified.map_or(true, lower) {
                unified = Some(index);
            }
        }

        if let Some(index) = unified {
            if self.unified.insert((required.clone(), index)) {
                let target = &self.targets[index].identity;
                debug!(%required, %target, "unified assembly reference to a higher version");
                self.diagnostics.report(
                    DiagnosticKind::VersionUnified,
                    format!("'{referencing}' references '{required}', bound to '{target}'"),
                );
            }
            return Bound::Target(index);
        }

        let diagnostics = self.diagnostics;
        let symbol = self
            .missing
            .entry(required.clone())
            .or_insert_with(|| {
                warn!(%required, %referencing, "assembly reference resolved to a missing assembly");
                diagnostics.report(
                    DiagnosticKind::MissingAssembly,
                    format!("'{referencing}' references '{required}', which is not referenced"),
                );
                MissingAssemblySymbol::new(required.clone())
            })
            .clone();
        Bound::Missing(symbol)
    }
}

/// What a reuse candidate must be bound to
enum Expected {
    Symbol(AssemblySymbol),
    /// The candidate itself
    Itself,
    Missing,
    /// Not known yet because of a reference cycle; nothing matches
    Unknown,
}

struct Expectation {
    corlib: Expected,
    modules: Vec<Vec<Expected>>,
}

impl Expectation {
    fn link_matches(
        link: Option<&AssemblyLink>,
        expected: &Expected,
        candidate: &AssemblySymbol,
    ) -> bool {
        let Some(link) = link else {
            return false;
        };
        match expected {
            Expected::Symbol(symbol) => link.matches(symbol),
            Expected::Itself => link.matches(candidate),
            Expected::Missing => matches!(link, AssemblyLink::Missing(_)),
            Expected::Unknown => false,
        }
    }

    /// Whether `candidate` is bound exactly as expected
    fn is_satisfied_by(&self, candidate: &AssemblySymbol, is_linked: bool) -> bool {
        if candidate.is_linked() != is_linked
            || !Self::link_matches(candidate.corlib_link(), &self.corlib, candidate)
        {
            return false;
        }

        let modules = candidate.modules();
        modules.len() == self.modules.len()
            && modules.iter().zip(&self.modules).all(|(module, expected)| {
                module.reference_links().is_some_and(|links| {
                    links.len() == expected.len()
                        && links.iter().zip(expected).all(|(link, expected)| {
                            Self::link_matches(Some(link), expected, candidate)
                        })
                })
            })
    }
}

/// Chooses a symbol for every target
struct SymbolSelector<'a> {
    consumer: &'a Arc<SourceAssemblySymbol>,
    targets: &'a [Target],
    bindings: &'a [Vec<Vec<Bound>>],
    corlib: Corlib,
    cache: &'a MetadataCache,
    symbols: Vec<Option<AssemblySymbol>>,
    fresh: Vec<bool>,
    in_progress: Vec<bool>,
}

impl SymbolSelector<'_> {
    fn select(&mut self, index: usize) -> Option<AssemblySymbol> {
        if let Some(symbol) = &self.symbols[index] {
            return Some(symbol.clone());
        }
        if self.in_progress[index] {
            return None;
        }

        self.in_progress[index] = true;
        let expectation = self.expectation(index);
        let (symbol, fresh) = self.reuse_or_create(index, &expectation);
        self.in_progress[index] = false;

        self.fresh[index] = fresh;
        self.symbols[index] = Some(symbol.clone());
        Some(symbol)
    }

    fn expected(&mut self, index: usize, of: usize) -> Expected {
        if index == of {
            return Expected::Itself;
        }
        match self.select(of) {
            Some(symbol) => Expected::Symbol(symbol),
            None => Expected::Unknown,
        }
    }

    fn expectation(&mut self, index: usize) -> Expectation {
        let corlib = match self.corlib {
            Corlib::Target(corlib) => self.expected(index, corlib),
            Corlib::Missing => Expected::Missing,
        };

        let bindings = self.bindings;
        let mut modules = Vec::with_capacity(bindings[index].len());
        for module in &bindings[index] {
            let mut expected = Vec::with_capacity(module.len());
            for bound in module {
                expected.push(match bound {
                    Bound::Target(target) => self.expected(index, *target),
                    Bound::Missing(_) => Expected::Missing,
                });
            }
            modules.push(expected);
        }

        Expectation { corlib, modules }
    }

    fn reuse_or_create(&self, index: usize, expectation: &Expectation) -> (AssemblySymbol, bool) {
        let target = &self.targets[index];
        let is_linked = target.is_linked;

        match &target.source {
            TargetSource::Consumer => (AssemblySymbol::Source(self.consumer.clone()), false),
            TargetSource::File { key, metadata } => {
                let reused = self.cache.find_reusable_assembly_symbol(key, |candidate| {
                    let symbol = AssemblySymbol::Pe(candidate.clone());
                    Arc::ptr_eq(candidate.metadata(), metadata)
                        && expectation.is_satisfied_by(&symbol, is_linked)
                });
                if let Some(symbol) = reused {
                    debug!(assembly = %target.identity, "reusing cached assembly symbol");
                    return (AssemblySymbol::Pe(symbol), false);
                }

                let symbol = PeAssemblySymbol::new(metadata.clone(), is_linked);
                if !self.cache.register_assembly_symbol(key, &symbol) {
                    debug!(file = %key, "cache entry gone, assembly symbol not registered");
                }
                debug!(assembly = %target.identity, "created assembly symbol");
                (AssemblySymbol::Pe(symbol), true)
            }
            TargetSource::Image { reference, metadata } => {
                let MetadataReference::Image { image, .. } = reference.as_ref() else {
                    return (
                        AssemblySymbol::Pe(PeAssemblySymbol::new(metadata.clone(), is_linked)),
                        true,
                    );
                };

                let reused = image.find_symbol(|candidate| {
                    expectation.is_satisfied_by(&AssemblySymbol::Pe(candidate.clone()), is_linked)
                });
                if let Some(symbol) = reused {
                    return (AssemblySymbol::Pe(symbol), false);
                }

                let symbol = PeAssemblySymbol::new(metadata.clone(), is_linked);
                image.register_symbol(&symbol);
                (AssemblySymbol::Pe(symbol), true)
            }
            TargetSource::Compilation {
                compilation,
                assembly,
            } => {
                let source = AssemblySymbol::Source(assembly.clone());
                if !assembly.is_corlib() && expectation.is_satisfied_by(&source, is_linked) {
                    debug!(assembly = %target.identity, "reusing referenced source assembly");
                    return (source, false);
                }

                let reused = compilation.find_retargeting_assembly_symbol(|candidate| {
                    let symbol = AssemblySymbol::Retargeting(candidate.clone());
                    expectation.is_satisfied_by(&symbol, is_linked)
                });
                if let Some(symbol) = reused {
                    debug!(assembly = %target.identity, "reusing retargeting assembly symbol");
                    return (AssemblySymbol::Retargeting(symbol), false);
                }

                let symbol = RetargetingAssemblySymbol::new(assembly, is_linked);
                compilation.add_retargeting_assembly_symbol(&symbol);
                debug!(assembly = %target.identity, "created retargeting assembly symbol");
                (AssemblySymbol::Retargeting(symbol), true)
            }
        }
    }
}

/// Hand dependencies no target satisfies to `resolver`, appending what it returns to
/// `implicit` until nothing new turns up
fn resolve_missing_assemblies(
    resolver: &dyn MissingAssemblyResolver,
    targets: &[Target],
    cache: &MetadataCache,
    diagnostics: &Diagnostics,
    implicit: &mut Vec<(Arc<MetadataReference>, TargetSource)>,
) {
    let mut available: Vec<AssemblyIdentity> =
        targets.iter().map(|target| target.identity.clone()).collect();
    let mut queue: VecDeque<(AssemblyIdentity, Vec<AssemblyIdentity>)> = targets
        .iter()
        .map(|target| (target.identity.clone(), target.references.concat()))
        .collect();
    let mut requested: HashSet<AssemblyIdentity> = HashSet::new();

    while let Some((definition, required)) = queue.pop_front() {
        for reference in required {
            if available.iter().any(|identity| identity.can_unify_to(&reference))
                || !requested.insert(reference.clone())
            {
                continue;
            }

            let Some(resolved) = resolver.resolve_missing_assembly(&definition, &reference) else {
                trace!(%reference, "resolver did not find missing assembly");
                continue;
            };

            match load(&resolved, cache) {
                Loaded::Assembly(source) => {
                    let Some(identity) = source.identity().cloned() else {
                        continue;
                    };
                    if available.iter().any(|known| known.is_equivalent(&identity)) {
                        continue;
                    }

                    debug!(%reference, resolved = %identity, "resolved missing assembly");
                    available.push(identity.clone());
                    queue.push_back((identity, source.module_references().concat()));
                    implicit.push((resolved, source));
                }
                Loaded::Module { .. } => {
                    debug!(%reference, "resolver returned a module, ignored");
                }
                Loaded::Failed(failure) => report_failure(diagnostics, &failure),
            }
        }
    }
}

pub(crate) fn bind(compilation: &Compilation, manager: &ReferenceManager) -> BoundReferences {
    let references = compilation.external_references();
    let options = compilation.options();
    let cache = options.cache.as_ref();
    let diagnostics = Diagnostics::new();

    debug!(
        compilation = compilation.name(),
        references = references.len(),
        "binding references"
    );

    for reference in references {
        if let MetadataReference::Compilation {
            compilation: referenced,
            ..
        } = reference.as_ref()
        {
            referenced.assembly();
        }
    }

    let loaded = load_all(references, cache);

    // Later references supersede earlier ones to the same assembly
    let mut superseded: Vec<Option<usize>> = vec![None; references.len()];
    let mut aliases: Vec<Vec<String>> = references
        .iter()
        .map(|reference| reference.properties().aliases.clone())
        .collect();
    let mut survivors: Vec<usize> = Vec::new();

    for index in (0..loaded.len()).rev() {
        let Loaded::Assembly(source) = &loaded[index] else {
            continue;
        };
        let Some(identity) = source.identity() else {
            continue;
        };

        let winner = survivors.iter().copied().find(|&winner| {
            let Loaded::Assembly(other) = &loaded[winner] else {
                return false;
            };
            source.is_same_assembly(other)
                || other.identity().is_some_and(|other| other.is_equivalent(identity))
        });

        match winner {
            Some(winner) => {
                trace!(
                    reference = %references[index],
                    winner = %references[winner],
                    "superseded duplicate reference"
                );
                superseded[index] = Some(winner);

                let merged = std::mem::take(&mut aliases[index]);
                merge_aliases(&mut aliases[winner], &merged);

                if references[index].properties().embed_interop_types
                    != references[winner].properties().embed_interop_types
                {
                    diagnostics.report(
                        DiagnosticKind::AssemblySpecifiedForLinkAndRef,
                        format!(
                            "'{}' and '{}' reference '{identity}' with and without embedding",
                            references[index], references[winner]
                        ),
                    );
                }
            }
            None => {
                for &other in &survivors {
                    let Loaded::Assembly(other_source) = &loaded[other] else {
                        continue;
                    };
                    if other_source
                        .identity()
                        .is_some_and(|other| other.is_other_version_of(identity))
                    {
                        diagnostics.report(
                            DiagnosticKind::DuplicateImport,
                            format!(
                                "'{}' and '{}' reference different versions of '{}'",
                                references[index], references[other], identity.name
                            ),
                        );
                    }
                }
                survivors.push(index);
            }
        }
    }
    survivors.reverse();

    // Netmodules join the source assembly in reference order
    let mut module_names: HashSet<String> = HashSet::new();
    let mut added_modules: Vec<(usize, Arc<ModuleMetadata>, Option<FileKey>)> = Vec::new();
    for (index, loaded) in loaded.iter().enumerate() {
        match loaded {
            Loaded::Module { metadata, key } => {
                if !module_names.insert(metadata.name().to_lowercase()) {
                    diagnostics.report(
                        DiagnosticKind::DuplicateModuleName,
                        format!(
                            "'{}' defines module '{}' a second time",
                            references[index],
                            metadata.name()
                        ),
                    );
                }
                added_modules.push((index, metadata.clone(), key.clone()));
            }
            Loaded::Failed(failure) => report_failure(&diagnostics, failure),
            Loaded::Assembly(_) => {}
        }
    }

    let module_metadata: Vec<_> = added_modules
        .iter()
        .map(|(_, metadata, _)| metadata.clone())
        .collect();
    let assembly =
        SourceAssemblySymbol::new(compilation.name(), compilation.weak(), &module_metadata);
    manager.mark_assembly_created();

    for ((_, _, key), module) in added_modules.iter().zip(assembly.added_modules()) {
        if let Some(key) = key {
            if !cache.register_module_symbol(key, module) {
                debug!(file = %key, "cache entry gone, module symbol not registered");
            }
        }
    }

    let mut targets: Vec<Target> = Vec::with_capacity(survivors.len() + 1);
    targets.push(Target {
        source: TargetSource::Consumer,
        identity: assembly.identity().clone(),
        references: Vec::new(),
        is_linked: false,
    });
    let mut target_of: Vec<Option<usize>> = vec![None; references.len()];
    for &index in &survivors {
        let Loaded::Assembly(source) = &loaded[index] else {
            continue;
        };
        let Some(identity) = source.identity().cloned() else {
            continue;
        };
        target_of[index] = Some(targets.len());
        let is_linked = references[index].properties().embed_interop_types;
        targets.push(Target::new(source.clone(), identity, is_linked));
    }

    let mut implicit: Vec<(Arc<MetadataReference>, TargetSource)> = Vec::new();
    if options.resolve_missing_assemblies {
        if let Some(resolver) = &options.resolver {
            let mut scope: Vec<Target> = Vec::new();
            scope.push(Target {
                source: TargetSource::Consumer,
                identity: assembly.identity().clone(),
                references: module_metadata
                    .iter()
                    .map(|module| module.assembly_references().to_vec())
                    .collect(),
                is_linked: false,
            });
            scope.extend(targets.iter().skip(1).cloned());
            resolve_missing_assemblies(
                resolver.as_ref(),
                &scope,
                cache,
                &diagnostics,
                &mut implicit,
            );
        }
    }
    let implicit_start = targets.len();
    for (_, source) in &implicit {
        if let Some(identity) = source.identity().cloned() {
            targets.push(Target::new(source.clone(), identity, false));
        }
    }

    // The source module references every other target, netmodules follow
    let referenced_identities: Vec<AssemblyIdentity> = targets
        .iter()
        .skip(1)
        .map(|target| target.identity.clone())
        .collect();
    targets[0].references = std::iter::once(referenced_identities.clone())
        .chain(
            module_metadata
                .iter()
                .map(|module| module.assembly_references().to_vec()),
        )
        .collect();

    let corlib = if references.is_empty() {
        Corlib::Target(0)
    } else {
        match targets
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, target)| target.references.iter().all(Vec::is_empty))
        {
            Some((index, target)) => {
                debug!(corlib = %target.identity, "selected core library");
                Corlib::Target(index)
            }
            None => {
                diagnostics.report(
                    DiagnosticKind::MissingCorLibrary,
                    format!(
                        "no reference of '{}' provides the core library",
                        compilation.name()
                    ),
                );
                Corlib::Missing
            }
        }
    };

    let mut binder = IdentityBinder {
        targets: &targets,
        diagnostics: &diagnostics,
        missing: HashMap::new(),
        unified: HashSet::new(),
    };
    let mut bindings: Vec<Vec<Vec<Bound>>> = Vec::with_capacity(targets.len());
    for (index, target) in targets.iter().enumerate() {
        let mut modules = Vec::with_capacity(target.references.len());
        for (ordinal, module) in target.references.iter().enumerate() {
            if index == 0 && ordinal == 0 {
                modules.push((1..targets.len()).map(Bound::Target).collect());
            } else {
                modules.push(
                    module
                        .iter()
                        .map(|required| binder.bind(required, &target.identity))
                        .collect(),
                );
            }
        }
        bindings.push(modules);
    }
    let mut missing: Vec<Arc<MissingAssemblySymbol>> = binder.missing.into_values().collect();
    missing.sort_by_key(|symbol| symbol.identity().to_string());

    // Selection and registration happen under the cache lock, so no other compilation sees a
    // symbol before it is bound
    let guard = cache.lock();

    let mut selector = SymbolSelector {
        consumer: &assembly,
        targets: &targets,
        bindings: &bindings,
        corlib,
        cache,
        symbols: vec![None; targets.len()],
        fresh: vec![false; targets.len()],
        in_progress: vec![false; targets.len()],
    };
    selector.symbols[0] = Some(AssemblySymbol::Source(assembly.clone()));
    for index in 1..targets.len() {
        selector.select(index);
    }
    let fresh = selector.fresh;
    let symbols: Vec<AssemblySymbol> = selector.symbols.into_iter().flatten().collect();

    let corlib_symbol = match corlib {
        Corlib::Target(index) => symbols[index].clone(),
        Corlib::Missing => AssemblySymbol::Missing(MissingAssemblySymbol::missing_corlib()),
    };
    for (index, symbol) in symbols.iter().enumerate() {
        if index != 0 && !fresh[index] {
            continue;
        }

        symbol.set_corlib(AssemblyLink::to(&corlib_symbol));
        for (ordinal, module) in symbol.modules().iter().enumerate() {
            let links: Vec<AssemblyLink> = bindings[index]
                .get(ordinal)
                .map(|module| {
                    module
                        .iter()
                        .map(|bound| match bound {
                            Bound::Target(target) => AssemblyLink::to(&symbols[*target]),
                            Bound::Missing(missing) => AssemblyLink::Missing(missing.clone()),
                        })
                        .collect()
                })
                .unwrap_or_default();

            match module {
                ModuleSymbol::Source(source) => {
                    source.set_references(referenced_identities.clone(), links);
                }
                module => module.set_reference_links(links),
            }
        }
    }
    drop(guard);

    let explicit = loaded
        .into_iter()
        .enumerate()
        .map(|(index, loaded)| match loaded {
            Loaded::Failed(failure) => failure,
            Loaded::Module { .. } => {
                let ordinal = added_modules
                    .iter()
                    .position(|(reference, _, _)| *reference == index);
                match ordinal.and_then(|ordinal| assembly.added_modules().get(ordinal)) {
                    Some(module) => ReferenceBinding::Module(module.clone()),
                    None => ReferenceBinding::failed(
                        PathBuf::from(references[index].display()),
                        Error::Error("module was not added".to_string()),
                    ),
                }
            }
            Loaded::Assembly(_) => match (superseded[index], target_of[index]) {
                (Some(by), _) => ReferenceBinding::Superseded { by },
                (None, Some(target)) => ReferenceBinding::Assembly {
                    symbol: symbols[target].clone(),
                    aliases: std::mem::take(&mut aliases[index]),
                },
                (None, None) => ReferenceBinding::failed(
                    PathBuf::from(references[index].display()),
                    Error::Error("assembly has no identity".to_string()),
                ),
            },
        })
        .collect();

    let implicit = implicit
        .into_iter()
        .zip(symbols.iter().skip(implicit_start))
        .map(|((reference, _), symbol)| (reference, symbol.clone()))
        .collect();

    debug!(
        compilation = compilation.name(),
        assemblies = symbols.len() - 1,
        diagnostics = diagnostics.count(),
        "bound references"
    );

    BoundReferences {
        referenced_assemblies: symbols[1..].to_vec(),
        corlib: corlib_symbol,
        assembly,
        explicit,
        implicit,
        missing,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_merging() {
        let mut winner = Vec::new();
        merge_aliases(&mut winner, &[]);
        assert!(winner.is_empty());

        merge_aliases(&mut winner, &["A".to_string()]);
        assert_eq!(winner, [GLOBAL_ALIAS, "A"]);

        let mut winner = vec!["A".to_string()];
        merge_aliases(&mut winner, &["B".to_string(), "A".to_string()]);
        assert_eq!(winner, ["A", "B"]);

        let mut winner = vec!["A".to_string()];
        merge_aliases(&mut winner, &[]);
        assert_eq!(winner, ["A", GLOBAL_ALIAS]);
    }
}
