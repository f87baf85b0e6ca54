#[cfg(feature = "gpu")]
mod gpu {
    use kinema::{
        BlurDimensions, Color, Composition, Effect, EffectKind, Fps, Frame, GaussianBlurEffect,
        GpuRenderer, Layer, LayerKind, Property, RenderSettings, SolidLayer, TimeRange,
        Transform2D,
    };

    fn solid(name: &str, w: u32, h: u32, color: Color) -> Layer {
        Layer {
            name: name.into(),
            range: TimeRange {
                start: Frame(0),
                end: Frame(60),
            },
            transform: Some(Transform2D::default()),
            effects: Vec::new(),
            kind: LayerKind::Solid(SolidLayer {
                width: w,
                height: h,
                color: Property::constant(color),
            }),
        }
    }

    fn comp(layers: Vec<Layer>) -> Composition {
        Composition {
            width: 64,
            height: 64,
            duration: Frame(60),
            fps: Fps::new(30, 1).unwrap(),
            background: Some(Color::rgb(8, 8, 8)),
            layers,
        }
    }

    #[test]
    fn gpu_render_smoke() {
        let doc = comp(vec![solid("box", 32, 32, Color::rgb(255, 255, 255))]);
        let mut renderer = GpuRenderer::new();

        let settings = RenderSettings {
            clear_rgba: Some([0, 0, 0, 255]),
        };
        let frame = match renderer.render_frame(&doc, Frame(0), settings) {
            Ok(v) => v,
            Err(e) if e.to_string().contains("no gpu adapter available") => return,
            Err(e) => panic!("unexpected gpu render error: {e}"),
        };

        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 64);
        assert!(frame.premultiplied);
        assert!(frame.data.iter().any(|&x| x != 0));

        let again = match renderer.render_frame(&doc, Frame(0), settings) {
            Ok(v) => v,
            Err(e) if e.to_string().contains("no gpu adapter available") => return,
            Err(e) => panic!("unexpected gpu render error: {e}"),
        };
        assert_eq!(frame.data, again.data);
    }

    #[test]
    fn raster_effects_are_rejected_up_front() {
        let mut layer = solid("soft", 32, 32, Color::WHITE);
        layer.effects = vec![Effect {
            enabled: None,
            kind: EffectKind::GaussianBlur(GaussianBlurEffect {
                blurriness: Some(Property::constant(4.0)),
                dimensions: Some(Property::constant(BlurDimensions::All)),
                repeat_edge_pixels: Some(Property::constant(true)),
            }),
        }];
        let doc = comp(vec![layer]);

        // The check runs before any adapter is requested, so this holds on
        // adapterless hosts too.
        let mut renderer = GpuRenderer::new();
        let err = renderer
            .render_frame(&doc, Frame(0), RenderSettings::default())
            .unwrap_err();
        assert!(err.to_string().contains("raster effects"));
    }

    #[test]
    fn invisible_effects_do_not_block_the_gpu_path() {
        let mut layer = solid("sharp", 32, 32, Color::WHITE);
        layer.effects = vec![Effect {
            enabled: Some(Property::constant(false)),
            kind: EffectKind::GaussianBlur(GaussianBlurEffect {
                blurriness: Some(Property::constant(4.0)),
                dimensions: Some(Property::constant(BlurDimensions::All)),
                repeat_edge_pixels: Some(Property::constant(true)),
            }),
        }];
        let doc = comp(vec![layer]);

        let mut renderer = GpuRenderer::new();
        match renderer.render_frame(&doc, Frame(0), RenderSettings::default()) {
            Ok(frame) => assert!(frame.data.iter().any(|&x| x != 0)),
            Err(e) if e.to_string().contains("no gpu adapter available") => {}
            Err(e) => panic!("unexpected gpu render error: {e}"),
        }
    }
}
