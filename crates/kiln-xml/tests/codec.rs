use glam::{Vec2, Vec3};
use kiln_reflect::{
    reflect_class, reflect_enum, register, register_enum, EnumFlags, JenHash, ReflectedMut,
    ReflectedRef,
};
use kiln_xml::{codec, ConfigFile, Error, SaveFlags, XmlNode};

reflect_enum! {
    #[derive(Default)]
    pub enum Mode: u8 {
        #[default]
        Fast = 0,
        Exact = 1,
    }
}

reflect_enum! {
    pub enum Channel: u8 {
        Red = 0,
        Green = 1,
        Blue = 2,
    }
}

#[derive(Debug, Default, PartialEq)]
struct Scalars {
    count: i32,
    ratio: f64,
    enabled: bool,
    label: String,
    mode: Mode,
    mask: u16,
}

reflect_class! {
    Scalars {
        count,
        ratio,
        enabled,
        label,
        mode,
        mask,
    }
}

#[derive(Debug, Default, PartialEq)]
struct Slot {
    weight: f32,
}

reflect_class! {
    Slot {
        weight,
    }
}

#[derive(Debug, Default)]
struct Rig {
    name: String,
    offset: Vec3,
    channels: EnumFlags<Channel>,
    levels: [u8; 3],
    points: [Vec2; 2],
    inner: Slot,
    slots: [Slot; 2],
}

reflect_class! {
    Rig {
        name,
        offset,
        channels,
        levels,
        points,
        inner,
        slots,
    }
}

reflect_enum! {
    pub enum Layer: u8 {
        Top = 0,
        Side = 1,
    }
}

#[derive(Debug, Default)]
struct Masks {
    layers: [EnumFlags<Layer>; 2],
    single: EnumFlags<Layer>,
}

reflect_class! {
    Masks {
        layers,
        single,
    }
}

#[derive(Default)]
struct Unlisted {
    value: u32,
}

reflect_class! {
    Unlisted {
        value,
    }
}

#[derive(Default)]
struct Holder {
    unlisted: Unlisted,
}

reflect_class! {
    Holder {
        unlisted,
    }
}

fn setup() {
    register::<Slot>();
    register::<Rig>();
    register_enum::<Channel>();
    register_enum::<Mode>();
}

fn sample_scalars() -> Scalars {
    Scalars {
        count: -42,
        ratio: 0.125,
        enabled: true,
        label: "left & right".to_string(),
        mode: Mode::Exact,
        mask: 0xBEEF,
    }
}

fn sample_rig() -> Rig {
    let mut rig = Rig {
        name: "arm".to_string(),
        offset: Vec3::new(1.0, -2.5, 3.0),
        channels: EnumFlags::empty().with(Channel::Red).with(Channel::Blue),
        levels: [1, 2, 3],
        points: [Vec2::new(0.5, 1.5), Vec2::new(-1.0, 4.0)],
        ..Default::default()
    };
    rig.inner.weight = 0.75;
    rig.slots[1].weight = 9.0;
    rig
}

#[test]
fn test_scalar_round_trip() {
    let original = sample_scalars();
    let mut doc = XmlNode::document();
    codec::save(ReflectedRef::new(&original), &mut doc, true).unwrap();

    let xml = doc.to_xml_string().unwrap();
    let parsed = XmlNode::parse_document(&xml).unwrap();

    let mut loaded = Scalars::default();
    assert!(codec::load(&mut ReflectedMut::new(&mut loaded), &parsed, true).unwrap());
    assert_eq!(loaded, original);

    let view = ReflectedRef::new(&loaded);
    let reference = ReflectedRef::new(&original);
    for i in 0..view.num_fields() {
        assert_eq!(view.value(i).unwrap(), reference.value(i).unwrap());
    }
}

#[test]
fn test_save_v1_layout() {
    setup();
    let rig = sample_rig();
    let mut node = XmlNode::new("root");
    codec::save(ReflectedRef::new(&rig), &mut node, false).unwrap();

    assert_eq!(node.find_child("offset").unwrap().text, "[1, -2.5, 3]");
    assert_eq!(node.find_child("channels").unwrap().text, "Red|Blue");
    assert_eq!(node.find_child("levels").unwrap().text, "{1, 2, 3}");
    let slots = node.find_child("slots").unwrap();
    assert_eq!(slots.find_child("i:1").unwrap().find_child("weight").unwrap().text, "9");

    let mut loaded = Rig::default();
    codec::load(&mut ReflectedMut::new(&mut loaded), &node, false).unwrap();
    assert_eq!(loaded.offset, rig.offset);
    assert_eq!(loaded.channels, rig.channels);
    assert_eq!(loaded.points, rig.points);
    assert_eq!(loaded.slots, rig.slots);
}

#[test]
fn test_save_v2_layout() {
    setup();
    let rig = sample_rig();
    let mut doc = XmlNode::document();
    codec::save_v2(ReflectedRef::new(&rig), &mut doc, SaveFlags::class_node()).unwrap();

    let node = doc.find_child("Rig").unwrap();
    assert_eq!(node.attribute("levels-0"), Some("1"));
    assert_eq!(node.attribute("levels-2"), Some("3"));
    assert_eq!(node.find_child("name").unwrap().text, "arm");

    let offset = node.find_child("offset").unwrap();
    assert_eq!(offset.attribute("x"), Some("1"));
    assert_eq!(offset.attribute("y"), Some("-2.5"));
    assert_eq!(offset.attribute("w"), None);

    let channels = node.find_child("channels").unwrap();
    assert_eq!(channels.attribute("Red"), Some("true"));
    assert_eq!(channels.attribute("Green"), Some("false"));
    assert_eq!(channels.attribute("Blue"), Some("true"));

    assert_eq!(node.find_child("points-1").unwrap().attribute("y"), Some("4"));
    assert_eq!(node.find_child("inner").unwrap().attribute("weight"), Some("0.75"));
    assert_eq!(node.find_child("slots-1").unwrap().attribute("weight"), Some("9"));

    let mut strings = XmlNode::document();
    let flags = SaveFlags::class_node().with_string_as_attribute();
    codec::save_v2(ReflectedRef::new(&rig), &mut strings, flags).unwrap();
    assert_eq!(strings.find_child("Rig").unwrap().attribute("name"), Some("arm"));
}

#[test]
fn test_v2_round_trip() {
    setup();
    let rig = sample_rig();
    let mut doc = XmlNode::document();
    codec::save_v2(ReflectedRef::new(&rig), &mut doc, SaveFlags::class_node()).unwrap();
    let parsed = XmlNode::parse_document(&doc.to_xml_string().unwrap()).unwrap();

    let mut loaded = Rig::default();
    assert!(codec::load_v2(&mut ReflectedMut::new(&mut loaded), &parsed, true).unwrap());

    assert_eq!(loaded.name, rig.name);
    assert_eq!(loaded.offset, rig.offset);
    assert_eq!(loaded.channels, rig.channels);
    assert_eq!(loaded.levels, rig.levels);
    assert_eq!(loaded.points, rig.points);
    assert_eq!(loaded.inner, rig.inner);
    assert_eq!(loaded.slots, rig.slots);
}

#[test]
fn test_save_twice_overwrites_text() {
    setup();
    let scalars = sample_scalars();
    let mut node = XmlNode::new("root");
    codec::save(ReflectedRef::new(&scalars), &mut node, false).unwrap();
    codec::save(ReflectedRef::new(&scalars), &mut node, false).unwrap();
    assert_eq!(node.find_child("count").unwrap().text, "-42");
    assert_eq!(node.find_child("mode").unwrap().text, "Exact");

    let mut loaded = Scalars::default();
    codec::load(&mut ReflectedMut::new(&mut loaded), &node, false).unwrap();
    assert_eq!(loaded, scalars);

    let rig = sample_rig();
    let mut doc = XmlNode::document();
    codec::save_v2(ReflectedRef::new(&rig), &mut doc, SaveFlags::class_node()).unwrap();
    codec::save_v2(ReflectedRef::new(&rig), &mut doc, SaveFlags::class_node()).unwrap();
    let node = doc.find_child("Rig").unwrap();
    assert_eq!(node.find_child("name").unwrap().text, "arm");

    let mut loaded = Rig::default();
    assert!(codec::load_v2(&mut ReflectedMut::new(&mut loaded), &doc, true).unwrap());
    assert_eq!(loaded.name, rig.name);
}

#[test]
fn test_unregistered_flags_saved_as_text() {
    let masks = Masks {
        layers: [EnumFlags::empty().with(Layer::Side), EnumFlags::empty().with(Layer::Top)],
        single: EnumFlags::empty().with(Layer::Top).with(Layer::Side),
    };
    let mut node = XmlNode::new("Masks");
    codec::save_v2(ReflectedRef::new(&masks), &mut node, SaveFlags::default()).unwrap();

    assert_eq!(node.find_child("layers").unwrap().text, "{Side, Top}");
    assert_eq!(node.find_child("single").unwrap().text, "Top|Side");
    assert!(node.find_child("layers-0").is_none());

    let mut loaded = Masks::default();
    codec::load_v2(&mut ReflectedMut::new(&mut loaded), &node, false).unwrap();
    assert_eq!(loaded.layers, masks.layers);
    assert_eq!(loaded.single, masks.single);
}

#[test]
fn test_load_v2_flags_none_and_hashed_names() {
    setup();
    let hashed = JenHash::new("levels").to_name();
    let xml = format!(
        r#"<Rig {hashed}-1="7" unknown="1" levels-9="3">
             <channels Red="false" Green="0"/>
             <h:{:X} x="5"/>
             <missing/>
           </Rig>"#,
        JenHash::new("offset").raw()
    );
    let node = XmlNode::parse(&xml).unwrap();

    let mut rig = sample_rig();
    codec::load_v2(&mut ReflectedMut::new(&mut rig), &node, false).unwrap();

    assert_eq!(rig.levels, [1, 7, 3]);
    assert_eq!(rig.channels, EnumFlags::empty());
    assert_eq!(rig.offset.x, 5.0);
}

#[test]
fn test_class_node_lookup() {
    let doc = XmlNode::parse_document("<Other/>").unwrap();
    let mut scalars = Scalars::default();
    assert!(!codec::load_v2(&mut ReflectedMut::new(&mut scalars), &doc, true).unwrap());

    let hashed = JenHash::new("Scalars").to_name();
    let doc = XmlNode::parse_document(&format!("<{hashed} count=\"5\"/>")).unwrap();
    assert!(codec::load_v2(&mut ReflectedMut::new(&mut scalars), &doc, true).unwrap());
    assert_eq!(scalars.count, 5);
}

#[test]
fn test_unregistered_class_is_an_error() {
    let node = XmlNode::parse(r#"<Holder><unlisted value="3"/></Holder>"#).unwrap();
    let mut holder = Holder::default();

    let result = codec::load_v2(&mut ReflectedMut::new(&mut holder), &node, false);
    assert!(matches!(
        result,
        Err(Error::Reflect(kiln_reflect::Error::ClassNotRegistered(_)))
    ));

    let mut doc = XmlNode::document();
    assert!(codec::save_v2(ReflectedRef::new(&holder), &mut doc, SaveFlags::default()).is_err());
}

#[test]
fn test_unknown_enum_member_is_an_error() {
    let node = XmlNode::parse(r#"<Scalars mode="Sloppy"/>"#).unwrap();
    let mut scalars = Scalars::default();
    let result = codec::load_v2(&mut ReflectedMut::new(&mut scalars), &node, false);
    assert!(matches!(
        result,
        Err(Error::Reflect(kiln_reflect::Error::UnknownEnumMember { .. }))
    ));
}

#[test]
fn test_config_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kiln.config");

    let original = sample_scalars();
    let mut config = ConfigFile::open(&path).unwrap();
    config
        .store_section("common", ReflectedRef::new(&original))
        .unwrap();
    config.save().unwrap();

    let config = ConfigFile::open(&path).unwrap();
    let common = config.document().find_child("common").unwrap();
    assert_eq!(common.attribute("label"), Some("left & right"));

    let mut loaded = Scalars::default();
    assert!(config
        .load_section("common", &mut ReflectedMut::new(&mut loaded))
        .unwrap());
    assert!(!config
        .load_section("zip", &mut ReflectedMut::new(&mut loaded))
        .unwrap());
    assert_eq!(loaded, original);
}
