mod common;

use std::sync::Arc;

use common::{names, Fixture};
use dotbind::{
    compilation::{
        Compilation, DiagnosticKind, DirectoryResolver, MetadataReference,
        MetadataReferenceProperties, ReferenceManagerState,
    },
    symbols::{AssemblySymbol, ModuleSymbol},
    Error,
};

#[test]
fn corlib_only() {
    let fixture = Fixture::new();
    let mscorlib = MetadataReference::file(fixture.assembly("mscorlib", &[]));

    let compilation = Compilation::create("App", vec![mscorlib.clone()], fixture.options());

    let corlib = compilation.corlib();
    assert_eq!(corlib.name(), "mscorlib");
    assert!(corlib.is_corlib());
    assert!(compilation
        .get_referenced_assembly_symbol(&mscorlib)
        .unwrap()
        .unwrap()
        .ptr_eq(&corlib));

    let module = compilation.source_module();
    assert_eq!(module.name(), "App.dll");
    assert_eq!(names(&module.referenced_assembly_symbols()), ["mscorlib"]);
    assert!(compilation.assembly().corlib().ptr_eq(&corlib));
    assert!(!compilation.diagnostics().has_any());
}

#[test]
fn empty_compilation_is_its_own_corlib() {
    let fixture = Fixture::new();
    let compilation = Compilation::create("Core", Vec::new(), fixture.options());
    assert_eq!(
        compilation.reference_manager_state(),
        ReferenceManagerState::Uninitialized
    );

    let assembly = AssemblySymbol::Source(compilation.assembly());
    assert!(assembly.is_corlib());
    assert_eq!(assembly.modules().len(), 1);
    assert!(compilation.source_module().referenced_assemblies().is_empty());
    assert!(compilation.referenced_assembly_symbols().is_empty());
    assert_eq!(
        compilation.reference_manager_state(),
        ReferenceManagerState::FullyBound
    );
}

#[test]
fn missing_corlib() {
    let fixture = Fixture::new();
    let lib = MetadataReference::file(fixture.assembly("Lib", &["mscorlib"]));

    let compilation = Compilation::create("App", vec![lib.clone()], fixture.options());

    let corlib = compilation.corlib();
    assert!(corlib.is_missing());
    match &corlib {
        AssemblySymbol::Missing(missing) => assert!(missing.is_missing_corlib()),
        _ => panic!("Expected the missing core library"),
    }
    assert_eq!(
        compilation
            .diagnostics()
            .by_kind(DiagnosticKind::MissingCorLibrary)
            .len(),
        1
    );

    let lib = compilation
        .get_referenced_assembly_symbol(&lib)
        .unwrap()
        .unwrap();
    let bound = lib.modules()[0].referenced_assembly_symbols();
    assert!(bound[0].is_missing());
}

#[test]
fn duplicates_are_deterministic() {
    let fixture = Fixture::new();
    let mscorlib = fixture.assembly("mscorlib", &[]);
    let lib = fixture.assembly("Lib", &["mscorlib"]);
    let util = fixture.assembly("Util", &["mscorlib"]);

    for _ in 0..3 {
        let first_lib = MetadataReference::file(&lib);
        let last_lib = MetadataReference::file(&lib);
        let references = vec![
            MetadataReference::file(&mscorlib),
            first_lib.clone(),
            MetadataReference::file(&util),
            last_lib.clone(),
        ];
        let compilation = Compilation::create("App", references, fixture.options());

        assert_eq!(
            names(&compilation.referenced_assembly_symbols()),
            ["mscorlib", "Util", "Lib"]
        );
        assert!(compilation
            .get_referenced_assembly_symbol(&first_lib)
            .unwrap()
            .is_none());
        assert_eq!(
            compilation
                .get_referenced_assembly_symbol(&last_lib)
                .unwrap()
                .unwrap()
                .name(),
            "Lib"
        );
        assert!(!compilation.diagnostics().has_any());
    }
}

#[test]
fn declaration_order_is_preserved() {
    let fixture = Fixture::new();
    let mscorlib = MetadataReference::file(fixture.assembly("mscorlib", &[]));
    let x = MetadataReference::file(fixture.assembly("X", &["mscorlib"]));
    let y = MetadataReference::file(fixture.assembly("Y", &["mscorlib"]));

    let first = Compilation::create(
        "First",
        vec![mscorlib.clone(), x.clone(), y.clone()],
        fixture.options(),
    );
    let second = Compilation::create(
        "Second",
        vec![y.clone(), mscorlib.clone(), x.clone()],
        fixture.options(),
    );

    let module = first.source_module();
    let order: Vec<_> = module
        .referenced_assemblies()
        .into_iter()
        .map(|identity| identity.name)
        .collect();
    assert_eq!(order, ["mscorlib", "X", "Y"]);
    assert_eq!(
        names(&second.source_module().referenced_assembly_symbols()),
        ["Y", "mscorlib", "X"]
    );

    // Same bindings, so the symbols are shared
    for reference in [&mscorlib, &x, &y] {
        let a = first.get_referenced_assembly_symbol(reference).unwrap().unwrap();
        let b = second.get_referenced_assembly_symbol(reference).unwrap().unwrap();
        assert!(a.ptr_eq(&b));
    }
}

#[test]
fn aliases_are_merged() {
    let fixture = Fixture::new();
    let path = fixture.assembly("Lib", &[]);
    let plain = MetadataReference::file(&path);
    let aliased = MetadataReference::file_with(
        &path,
        MetadataReferenceProperties::assembly().with_aliases(["L"]),
    );

    let compilation =
        Compilation::create("App", vec![plain.clone(), aliased.clone()], fixture.options());

    assert_eq!(compilation.reference_aliases(&aliased).unwrap(), ["L", "global"]);
    assert_eq!(compilation.reference_aliases(&plain).unwrap(), ["L", "global"]);
    assert_eq!(compilation.extern_aliases(), ["L"]);
}

#[test]
fn link_and_reference() {
    let fixture = Fixture::new();
    let path = fixture.assembly("Interop", &[]);
    let linked = MetadataReference::file_with(
        &path,
        MetadataReferenceProperties::assembly().with_embed_interop_types(true),
    );
    let referenced = MetadataReference::file(&path);

    let compilation =
        Compilation::create("App", vec![linked, referenced.clone()], fixture.options());

    let symbol = compilation
        .get_referenced_assembly_symbol(&referenced)
        .unwrap()
        .unwrap();
    assert!(!symbol.is_linked());
    assert_eq!(
        compilation
            .diagnostics()
            .by_kind(DiagnosticKind::AssemblySpecifiedForLinkAndRef)
            .len(),
        1
    );
}

#[test]
fn other_versions_are_kept() {
    let fixture = Fixture::new();
    let mscorlib = MetadataReference::file(fixture.assembly("mscorlib", &[]));
    let v1 = MetadataReference::file(fixture.assembly_in("v1", "Lib, Version=1.0.0.0", &[]));
    let v2 = MetadataReference::file(fixture.assembly_in("v2", "Lib, Version=2.0.0.0", &[]));
    let client = MetadataReference::file(
        fixture.assembly("Client", &["mscorlib", "Lib, Version=1.0.0.0"]),
    );

    let compilation = Compilation::create(
        "App",
        vec![mscorlib, v1.clone(), v2.clone(), client.clone()],
        fixture.options(),
    );

    assert_eq!(compilation.referenced_assembly_symbols().len(), 4);
    assert_eq!(
        compilation
            .diagnostics()
            .by_kind(DiagnosticKind::DuplicateImport)
            .len(),
        1
    );

    // The exact version wins over a higher one
    let v1 = compilation.get_referenced_assembly_symbol(&v1).unwrap().unwrap();
    let client = compilation
        .get_referenced_assembly_symbol(&client)
        .unwrap()
        .unwrap();
    assert!(client.modules()[0].referenced_assembly_symbols()[1].ptr_eq(&v1));
    assert!(compilation
        .diagnostics()
        .by_kind(DiagnosticKind::VersionUnified)
        .is_empty());
}

#[test]
fn versions_unify_upwards() {
    let fixture = Fixture::new();
    let mscorlib = MetadataReference::file(fixture.assembly("mscorlib", &[]));
    let dep = MetadataReference::file(fixture.assembly("Dep, Version=2.0.0.0", &["mscorlib"]));
    let requires_v1 = ["mscorlib", "Dep, Version=1.0.0.0"];
    let lib = MetadataReference::file(fixture.assembly("Lib", &requires_v1));
    let other = MetadataReference::file(fixture.assembly("Other", &requires_v1));

    let compilation = Compilation::create(
        "App",
        vec![mscorlib, dep.clone(), lib.clone(), other],
        fixture.options(),
    );

    let dep = compilation.get_referenced_assembly_symbol(&dep).unwrap().unwrap();
    let lib = compilation.get_referenced_assembly_symbol(&lib).unwrap().unwrap();
    assert!(lib.modules()[0].referenced_assembly_symbols()[1].ptr_eq(&dep));

    let unified = compilation.diagnostics().by_kind(DiagnosticKind::VersionUnified);
    assert_eq!(unified.len(), 1);
    assert!(!compilation.diagnostics().has_errors());
}

#[test]
fn unresolved_references_are_missing() {
    let fixture = Fixture::new();
    let mscorlib = MetadataReference::file(fixture.assembly("mscorlib", &[]));
    let lib = MetadataReference::file(fixture.assembly("Lib", &["mscorlib", "Dep"]));
    let tool = MetadataReference::file(fixture.assembly("Tool", &["mscorlib", "Dep"]));

    let compilation = Compilation::create(
        "App",
        vec![mscorlib, lib.clone(), tool.clone()],
        fixture.options(),
    );

    let lib = compilation.get_referenced_assembly_symbol(&lib).unwrap().unwrap();
    let tool = compilation.get_referenced_assembly_symbol(&tool).unwrap().unwrap();
    let from_lib = &lib.modules()[0].referenced_assembly_symbols()[1];
    let from_tool = &tool.modules()[0].referenced_assembly_symbols()[1];
    assert!(from_lib.is_missing());
    assert_eq!(from_lib.name(), "Dep");
    assert!(from_lib.ptr_eq(from_tool));

    assert_eq!(compilation.missing_assembly_symbols().len(), 1);
    assert_eq!(
        compilation
            .diagnostics()
            .by_kind(DiagnosticKind::MissingAssembly)
            .len(),
        1
    );
}

#[test]
fn resolver_adds_implicit_references() {
    let fixture = Fixture::new();
    let mscorlib = MetadataReference::file(fixture.assembly("mscorlib", &[]));
    let lib = MetadataReference::file(fixture.assembly("Lib", &["mscorlib", "Dep"]));
    fixture.assembly("Dep", &["mscorlib", "Deeper"]);
    fixture.assembly("Deeper", &["mscorlib"]);

    let resolver = DirectoryResolver::new().with_search_path(fixture.root());
    let options = fixture.options().with_resolver(Arc::new(resolver));
    let compilation = Compilation::create("App", vec![mscorlib, lib.clone()], options);

    let implicit = compilation.implicit_references();
    let implicit_names: Vec<_> = implicit.iter().map(|reference| reference.display()).collect();
    assert_eq!(implicit.len(), 2);
    assert!(implicit_names[0].ends_with("Dep.dll"));
    assert!(implicit_names[1].ends_with("Deeper.dll"));

    assert_eq!(
        names(&compilation.referenced_assembly_symbols()),
        ["mscorlib", "Lib", "Dep", "Deeper"]
    );
    let lib = compilation.get_referenced_assembly_symbol(&lib).unwrap().unwrap();
    let dep = compilation
        .get_referenced_assembly_symbol(&implicit[0])
        .unwrap()
        .unwrap();
    assert!(lib.modules()[0].referenced_assembly_symbols()[1].ptr_eq(&dep));
    assert!(compilation.missing_assembly_symbols().is_empty());
}

#[test]
fn resolver_is_not_consulted_when_disabled() {
    let fixture = Fixture::new();
    let mscorlib = MetadataReference::file(fixture.assembly("mscorlib", &[]));
    let lib = MetadataReference::file(fixture.assembly("Lib", &["mscorlib", "Dep"]));
    fixture.assembly("Dep", &["mscorlib"]);

    let resolver = DirectoryResolver::new().with_search_path(fixture.root());
    let options = fixture
        .options()
        .with_resolver(Arc::new(resolver))
        .with_missing_assembly_resolution(false);
    let compilation = Compilation::create("App", vec![mscorlib, lib], options);

    assert!(compilation.implicit_references().is_empty());
    assert_eq!(compilation.missing_assembly_symbols().len(), 1);
}

#[test]
fn load_failures_are_reported() {
    let fixture = Fixture::new();
    let mscorlib = MetadataReference::file(fixture.assembly("mscorlib", &[]));
    let absent = MetadataReference::file(fixture.path("Absent.dll"));
    let garbage_path = fixture.path("Garbage.dll");
    std::fs::write(&garbage_path, b"MZ not really a PE image").unwrap();
    let garbage = MetadataReference::file(&garbage_path);

    let compilation = Compilation::create(
        "App",
        vec![absent.clone(), mscorlib.clone(), garbage.clone()],
        fixture.options(),
    );

    let error = compilation.get_referenced_assembly_symbol(&absent).unwrap_err();
    assert!(error.is_not_found());
    assert!(matches!(
        compilation.get_referenced_assembly_symbol(&garbage),
        Err(Error::MetadataRead { .. })
    ));
    assert_eq!(names(&compilation.referenced_assembly_symbols()), ["mscorlib"]);

    let diagnostics = compilation.diagnostics();
    assert_eq!(diagnostics.by_kind(DiagnosticKind::MetadataFileNotFound).len(), 1);
    assert_eq!(diagnostics.by_kind(DiagnosticKind::MetadataReadError).len(), 1);
    assert!(diagnostics.has_errors());
}

#[test]
fn netmodules_join_the_source_assembly() {
    let fixture = Fixture::new();
    let mscorlib = MetadataReference::file(fixture.assembly("mscorlib", &[]));
    let part = MetadataReference::module_file(fixture.netmodule("Part.netmodule", &["mscorlib"]));
    let other = MetadataReference::module_file(fixture.netmodule("Other.netmodule", &[]));

    let compilation = Compilation::create(
        "App",
        vec![part.clone(), mscorlib.clone(), other.clone()],
        fixture.options(),
    );

    let assembly = compilation.assembly();
    let modules = assembly.modules();
    let module_names: Vec<_> = modules.iter().map(|module| module.name().to_string()).collect();
    assert_eq!(module_names, ["App.dll", "Part.netmodule", "Other.netmodule"]);

    let part_symbol = compilation.get_referenced_module_symbol(&part).unwrap();
    assert!(part_symbol.ptr_eq(&modules[1]));
    assert!(part_symbol.referenced_assembly_symbols()[0].ptr_eq(&compilation.corlib()));
    match part_symbol.containing_assembly() {
        Some(AssemblySymbol::Source(source)) => assert!(Arc::ptr_eq(&source, &assembly)),
        _ => panic!("Expected the source assembly"),
    }

    assert!(matches!(
        compilation.get_referenced_assembly_symbol(&part),
        Err(Error::ImageKindMismatch(_))
    ));
    assert!(matches!(
        compilation.get_referenced_module_symbol(&mscorlib),
        Err(Error::ImageKindMismatch(_))
    ));
}

#[test]
fn duplicate_module_names() {
    let fixture = Fixture::new();
    let path = fixture.netmodule("Part.netmodule", &[]);

    let compilation = Compilation::create(
        "App",
        vec![
            MetadataReference::module_file(&path),
            MetadataReference::module_file(&path),
        ],
        fixture.options(),
    );

    assert_eq!(compilation.assembly().modules().len(), 3);
    assert_eq!(
        compilation
            .diagnostics()
            .by_kind(DiagnosticKind::DuplicateModuleName)
            .len(),
        1
    );
}

#[test]
fn multi_module_assemblies() {
    let fixture = Fixture::new();
    let mscorlib = MetadataReference::file(fixture.assembly("mscorlib", &[]));
    let dep = MetadataReference::file(fixture.assembly("Dep", &["mscorlib"]));
    fixture.netmodule("Multi.Part.netmodule", &["Dep"]);

    let multi_path = fixture.path("Multi.dll");
    dotbind::metadata::MetadataImageBuilder::new()
        .module("Multi.dll")
        .assembly(dotbind::AssemblyIdentity::parse("Multi").unwrap())
        .assembly_ref(dotbind::AssemblyIdentity::parse("mscorlib").unwrap())
        .file("Multi.Part.netmodule", true)
        .write_to(&multi_path)
        .unwrap();
    let multi = MetadataReference::file(&multi_path);

    let compilation = Compilation::create(
        "App",
        vec![mscorlib.clone(), multi.clone(), dep.clone()],
        fixture.options(),
    );

    let multi = compilation.get_referenced_assembly_symbol(&multi).unwrap().unwrap();
    let dep = compilation.get_referenced_assembly_symbol(&dep).unwrap().unwrap();
    let modules = multi.modules();
    assert_eq!(modules.len(), 2);
    assert_eq!(modules[1].name(), "Multi.Part.netmodule");

    assert!(modules[0].referenced_assembly_symbols()[0].ptr_eq(&compilation.corlib()));
    assert!(modules[1].referenced_assembly_symbols()[0].ptr_eq(&dep));
    match &modules[1] {
        ModuleSymbol::Pe(module) => assert_eq!(module.ordinal(), 1),
        _ => panic!("Expected a metadata module"),
    }
}

#[test]
fn images_share_symbols() {
    let fixture = Fixture::new();
    let mscorlib = MetadataReference::file(fixture.assembly("mscorlib", &[]));
    let data = dotbind::metadata::MetadataImageBuilder::new()
        .module("InMemory.dll")
        .assembly(dotbind::AssemblyIdentity::parse("InMemory").unwrap())
        .assembly_ref(dotbind::AssemblyIdentity::parse("mscorlib").unwrap())
        .build()
        .unwrap();
    let image = MetadataReference::image(
        data,
        "InMemory (image)",
        MetadataReferenceProperties::assembly(),
    )
    .unwrap();

    let first = Compilation::create(
        "First",
        vec![mscorlib.clone(), image.clone()],
        fixture.options(),
    );
    let second = Compilation::create(
        "Second",
        vec![mscorlib.clone(), image.clone()],
        fixture.options(),
    );

    let a = first.get_referenced_assembly_symbol(&image).unwrap().unwrap();
    let b = second.get_referenced_assembly_symbol(&image).unwrap().unwrap();
    assert!(a.ptr_eq(&b));
    assert_eq!(fixture.cache.assemblies_from_files().len(), 1);
}
