use camera_pull::{FormatDescriptor, PixelFormat, SampleClass, Size, ValueRange, describe};

#[test]
fn format_strings_round_trip_through_display() {
    for input in ["RGBA^640x480@30", "Yuv_8_88_Full^1920x1080", "Depth16mm@60", "Greyscale"] {
        let parsed: FormatDescriptor = input.parse().unwrap();
        assert_eq!(parsed.to_string(), input);
    }
}

#[test]
fn compose_matches_native_device_strings() {
    assert_eq!(
        FormatDescriptor::compose("FreenectDepthmm", 640, 480, 30),
        "FreenectDepthmm^640x480@30"
    );
    let parsed = FormatDescriptor::parse("FreenectDepthmm^640x480@30").unwrap();
    assert_eq!(parsed.pixel_format().unwrap(), PixelFormat::FreenectDepthMm);
    assert_eq!(parsed.size, Size { width: 640, height: 480 });
}

#[test]
fn malformed_dimensions_are_rejected() {
    for input in ["RGBA^640xabc", "RGBA^640", "RGBA@fast", "RGBA^-1x2"] {
        assert!(FormatDescriptor::parse(input).is_err(), "{input}");
    }
}

#[test]
fn unknown_names_parse_but_do_not_resolve() {
    let parsed = FormatDescriptor::parse("avc1^1280x720").unwrap();
    assert!(!parsed.is_unknown());
    assert_eq!(parsed.pixel_format().unwrap_err().0, "avc1");
    assert!(FormatDescriptor::parse("").unwrap().is_unknown());
}

#[test]
fn layouts_follow_the_format_taxonomy() {
    let nv12 = describe("Yuv_8_88_Smptec").unwrap();
    assert_eq!(nv12.channels_per_plane().collect::<Vec<_>>(), [1, 2]);
    assert_eq!(nv12.value_range, Some(ValueRange::SmpteC));

    let depth = describe("DepthFloatMetres").unwrap();
    assert!(depth.is_float());

    let palette = describe("Palettised_RGBA_8").unwrap();
    assert_eq!(palette.sample, SampleClass::Palettised);
    assert_eq!(palette.plane_count(), 2);

    assert!(describe("Yuv_8_88_Bt709").is_err());
}
