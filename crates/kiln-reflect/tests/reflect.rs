use std::ffi::CString;

use glam::Vec3;
use kiln_reflect::prelude::*;
use kiln_reflect::{
    reflect_class, reflect_enum, register, register_enum, Error, FieldDescriptor, ReflectorSchema,
};

reflect_enum! {
    #[derive(Default)]
    pub enum Quality: u8 {
        #[default]
        Low = 0,
        Medium = 1,
        High = 2,
    }
}

reflect_enum! {
    pub enum Feature: u8 {
        Shadows = 0,
        Bloom = 1,
        Fog = 3,
    }
}

#[derive(Default)]
struct Bounds {
    min: Vec3,
    max: Vec3,
}

reflect_class! {
    Bounds {
        min,
        max,
    }
}

#[derive(Default)]
struct Lod {
    distance: f32,
}

reflect_class! {
    Lod {
        distance,
    }
}

#[derive(Default)]
struct Orphan {
    id: u32,
}

reflect_class! {
    Orphan {
        id,
    }
}

#[derive(Default)]
struct Scene {
    id: i32,
    scale: f32,
    visible: bool,
    title: String,
    tag: CString,
    origin: Vec3,
    channels: [u8; 3],
    quality: Quality,
    features: EnumFlags<Feature>,
    bounds: Bounds,
    lods: [Lod; 2],
    orphan: Orphan,
}

reflect_class! {
    Scene {
        id as "identifier" => ["Scene id"],
        scale => ["Uniform scale", "1 is identity"],
        visible,
        title,
        tag,
        origin,
        channels,
        quality,
        features,
        bounds,
        lods,
        orphan,
    }
}

fn setup() {
    register::<Scene>();
    register::<Bounds>();
    register::<Lod>();
    register_enum::<Quality>();
    register_enum::<Feature>();
}

#[test]
fn test_descriptor_shape() {
    let class = Scene::class();
    assert_eq!(class.num_fields(), 12);
    assert_eq!(class.class_hash, JenHash::new("Scene"));

    let names: Vec<String> = class.type_names().into_iter().map(|n| n.into_owned()).collect();
    assert_eq!(names[0], "id");
    assert_eq!(names[11], "orphan");

    assert_eq!(class.fields[5].kind, FieldKind::Vector);
    assert_eq!(class.fields[5].num_items, 3);
    assert_eq!(class.fields[6].kind, FieldKind::Array);
    assert_eq!(class.fields[6].sub_kind, FieldKind::UnsignedInteger);
    assert_eq!(class.fields[10].kind, FieldKind::ArrayClass);
    assert_eq!(class.fields[10].type_hash, JenHash::new("Lod").raw());
    assert_eq!(class.fields[8].type_hash, JenHash::new("Feature").raw());

    assert_eq!(class.alias(0), Some("identifier"));
    assert_eq!(class.description(1).unwrap().part2, "1 is identity");
    for (i, field) in class.fields.iter().enumerate() {
        assert_eq!(field.index as usize, i);
    }
}

#[test]
fn test_scalar_get_set() {
    let mut scene = Scene::default();
    let mut view = ReflectedMut::new(&mut scene);

    view.set_value(0, "-12").unwrap();
    view.set_value(1, "0.5").unwrap();
    view.set_value(2, "true").unwrap();
    view.set_value(3, "main hall").unwrap();
    view.set_value(4, "c-string").unwrap();
    view.set_value_by_hash(JenHash::new("identifier"), "99").unwrap();

    let read = view.view();
    assert_eq!(read.value(0).unwrap(), "99");
    assert_eq!(read.value(1).unwrap(), "0.5");
    assert_eq!(read.value(2).unwrap(), "true");
    assert_eq!(read.value(3).unwrap(), "main hall");
    assert_eq!(read.value(4).unwrap(), "c-string");

    view.set_value(1, "not a number").unwrap();
    assert_eq!(scene.scale, 0.5);
    assert_eq!(scene.id, 99);
}

#[test]
fn test_vector_and_array_access() {
    let mut scene = Scene::default();
    let mut view = ReflectedMut::new(&mut scene);

    view.set_value_at(5, 0, "1.5").unwrap();
    view.set_value_at(5, 2, "-2").unwrap();
    view.set_value(6, "{10, 20, 30}").unwrap();
    view.set_value_at(6, 1, "25").unwrap();

    assert!(matches!(
        view.set_value_at(5, 3, "1"),
        Err(Error::SubIndexOutOfRange { .. })
    ));

    let read = view.view();
    assert_eq!(read.value_at(5, 0).unwrap(), "1.5");
    assert_eq!(read.value(5).unwrap(), "[1.5, 0, -2]");
    assert_eq!(read.value(6).unwrap(), "{10, 25, 30}");
    assert!(read.is_array(6));
    assert!(!read.is_array(5));

    assert_eq!(scene.origin, Vec3::new(1.5, 0.0, -2.0));
}

#[test]
fn test_enum_and_flags() {
    setup();
    let mut scene = Scene::default();
    let mut view = ReflectedMut::new(&mut scene);

    view.set_value(7, "High").unwrap();
    assert!(matches!(
        view.set_value(7, "Ultra"),
        Err(Error::UnknownEnumMember { .. })
    ));

    assert_eq!(view.view().value(8).unwrap(), "NULL");
    view.set_value(8, "Shadows|Fog|Unknown").unwrap();
    assert_eq!(view.view().value(8).unwrap(), "Shadows|Fog");
    assert_eq!(view.view().value_at(8, 3).unwrap(), "true");
    assert_eq!(view.view().value_at(8, 1).unwrap(), "false");

    view.set_value_at(8, 0, "false").unwrap();
    view.set_value_at(8, 1, "true").unwrap();

    assert_eq!(scene.quality, Quality::High);
    assert!(scene.features.contains(Feature::Bloom));
    assert!(!scene.features.contains(Feature::Shadows));
}

#[test]
fn test_sub_classes() {
    setup();
    let mut scene = Scene::default();
    scene.lods[1].distance = 40.0;

    {
        let mut view = ReflectedMut::new(&mut scene);
        assert!(view.view().is_sub_class(9));
        assert!(view.view().is_sub_class(10));
        assert!(!view.view().is_sub_class(0));

        let mut bounds = view.sub_class_mut(9).unwrap();
        bounds.set_value(1, "[4, 5, 6]").unwrap();

        let mut lod = view.sub_class_mut_at(10, 0).unwrap();
        lod.set_value(0, "12.5").unwrap();

        assert!(matches!(
            view.set_value(9, "x"),
            Err(Error::NotValueConvertible(FieldKind::Class))
        ));
        assert!(matches!(
            view.sub_class_mut_at(10, 2),
            Err(Error::SubIndexOutOfRange { .. })
        ));
        assert!(matches!(view.sub_class_mut(0), Err(Error::NotSubClass(_))));
    }

    let view = ReflectedRef::new(&scene);
    assert_eq!(view.sub_class_at(10, 1).unwrap().value(0).unwrap(), "40");
    assert_eq!(view.sub_class(10).unwrap().value(0).unwrap(), "12.5");
    assert_eq!(scene.bounds.max, Vec3::new(4.0, 5.0, 6.0));
}

#[test]
fn test_unregistered_sub_class() {
    let scene = Scene::default();
    let view = ReflectedRef::new(&scene);
    let hash = JenHash::new("Orphan").raw();

    match view.sub_class(11) {
        Err(Error::ClassNotRegistered(h)) => assert_eq!(h, hash),
        other => panic!("expected ClassNotRegistered, got {:?}", other.err()),
    }
}

#[test]
fn test_lookup_by_hash() {
    let scene = Scene::default();
    let view = ReflectedRef::new(&scene);

    let field = view.field_type_by_hash(JenHash::new("quality")).unwrap();
    assert_eq!(field.index, 7);
    assert!(view.field_type_by_hash(JenHash::new("missing")).is_none());
    assert!(view.field_type(12).is_none());
    assert!(matches!(
        view.value(12),
        Err(Error::FieldIndexOutOfRange { index: 12, count: 12 })
    ));
}

#[test]
fn test_schema_round_trip() {
    let hidden = FieldDescriptor {
        name_hash: JenHash::default(),
        ..Scene::class().fields[0].clone()
    };
    let anonymous = ClassDescriptor::builder("Anonymous")
        .hashed_field(hidden, JenHash::from_raw(0x1234ABCD))
        .build();

    let mut schema = ReflectorSchema::new();
    schema
        .add_class(Scene::class())
        .add_class(Bounds::class())
        .add_class(&anonymous)
        .add_enum(Quality::descriptor())
        .add_enum(Feature::descriptor());

    let data = schema.to_bytes().unwrap();
    let loaded = ReflectorSchema::from_bytes(&data).unwrap();
    assert_eq!(loaded.classes.len(), 3);
    assert_eq!(loaded.enums, schema.enums);

    for (original, reloaded) in schema.classes.iter().zip(&loaded.classes) {
        assert_eq!(original.class_hash, reloaded.class_hash);
        assert_eq!(original.class_name, reloaded.class_name);
        assert_eq!(original.num_fields(), reloaded.num_fields());
        assert_eq!(original.names, reloaded.names);
        assert_eq!(original.aliases, reloaded.aliases);
        assert_eq!(original.alias_hashes, reloaded.alias_hashes);
        assert_eq!(original.descriptions, reloaded.descriptions);
        for (a, b) in original.fields.iter().zip(&reloaded.fields) {
            assert!(a.same_layout(b), "{a:?} != {b:?}");
            assert!(b.accessors.is_none());
        }
    }

    let anonymous = loaded.class(JenHash::new("Anonymous")).unwrap();
    assert_eq!(anonymous.field_name(0), "h:1234ABCD");
}
