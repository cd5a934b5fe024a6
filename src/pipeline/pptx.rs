//! Presentation writer: serialise a [`Presentation`] as a `.pptx` package.
//!
//! The package is the smallest set of Office Open XML parts PowerPoint and
//! LibreOffice open without a repair prompt: one slide master, one blank
//! layout, one theme, and one part per slide. Pictures go to `ppt/media` as
//! PNG. Shapes are written in the deck's paint order.

use crate::deck::{MaskRect, Picture, Presentation, Shape, Slide, TextBox, TextStyle};
use crate::error::Pdf2PptxError;
use crate::pipeline::geometry::CanvasRect;
use image::Rgb;
use quick_xml::escape::escape;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::{debug, info};
use zip::result::ZipResult;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_PKG_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Language tag on every run.
const RUN_LANG: &str = "en-US";

/// DrawingML font size bounds, in hundredths of a point.
const MIN_FONT_SZ: i64 = 100;
const MAX_FONT_SZ: i64 = 400_000;

/// Write `deck` to `path`.
///
/// The package is assembled in memory and moved into place with a rename,
/// so an interrupted write never leaves a truncated file at `path`.
pub fn write_pptx(deck: &Presentation, path: &Path) -> Result<(), Pdf2PptxError> {
    let write_err = |source: std::io::Error| Pdf2PptxError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let bytes = to_bytes(deck).map_err(|e| write_err(std::io::Error::other(e.to_string())))?;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".pdf2pptx-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;
    tmp.write_all(&bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!(
        "Wrote {} slide(s), {} bytes → {}",
        deck.slides().len(),
        bytes.len(),
        path.display()
    );
    Ok(())
}

/// Serialise `deck` as `.pptx` bytes.
pub fn to_bytes(deck: &Presentation) -> ZipResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);

    let slide_count = deck.slides().len();

    put(&mut zip, "[Content_Types].xml", content_types(slide_count).as_bytes(), options)?;
    put(&mut zip, "_rels/.rels", ROOT_RELS.as_bytes(), options)?;
    put(&mut zip, "docProps/core.xml", CORE_PROPS.as_bytes(), options)?;
    put(&mut zip, "docProps/app.xml", app_props(slide_count).as_bytes(), options)?;
    put(&mut zip, "ppt/presentation.xml", presentation_xml(deck).as_bytes(), options)?;
    put(
        &mut zip,
        "ppt/_rels/presentation.xml.rels",
        presentation_rels(slide_count).as_bytes(),
        options,
    )?;
    put(&mut zip, "ppt/presProps.xml", PRES_PROPS.as_bytes(), options)?;
    put(&mut zip, "ppt/viewProps.xml", VIEW_PROPS.as_bytes(), options)?;
    put(&mut zip, "ppt/tableStyles.xml", TABLE_STYLES.as_bytes(), options)?;
    put(&mut zip, "ppt/slideMasters/slideMaster1.xml", SLIDE_MASTER.as_bytes(), options)?;
    put(
        &mut zip,
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        SLIDE_MASTER_RELS.as_bytes(),
        options,
    )?;
    put(&mut zip, "ppt/slideLayouts/slideLayout1.xml", SLIDE_LAYOUT.as_bytes(), options)?;
    put(
        &mut zip,
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        SLIDE_LAYOUT_RELS.as_bytes(),
        options,
    )?;
    put(&mut zip, "ppt/theme/theme1.xml", THEME.as_bytes(), options)?;

    let mut media_index = 0usize;
    for (i, slide) in deck.slides().iter().enumerate() {
        let n = i + 1;
        let parts = SlideParts::build(slide, &mut media_index);
        put(&mut zip, &format!("ppt/slides/slide{n}.xml"), parts.xml.as_bytes(), options)?;
        put(
            &mut zip,
            &format!("ppt/slides/_rels/slide{n}.xml.rels"),
            parts.rels.as_bytes(),
            options,
        )?;
        for (name, png) in parts.media {
            // PNG is already compressed.
            put(&mut zip, &format!("ppt/media/{name}"), png, stored)?;
        }
    }

    let bytes = zip.finish()?.into_inner();
    debug!("Packaged {} slide(s) into {} bytes", slide_count, bytes.len());
    Ok(bytes)
}

fn put(
    zip: &mut ZipWriter<Cursor<Vec<u8>>>,
    name: &str,
    body: &[u8],
    options: FileOptions,
) -> ZipResult<()> {
    zip.start_file(name, options)?;
    zip.write_all(body)?;
    Ok(())
}

/// XML and relationships of one slide, plus the media it references.
struct SlideParts<'a> {
    xml: String,
    rels: String,
    media: Vec<(String, &'a [u8])>,
}

impl<'a> SlideParts<'a> {
    fn build(slide: &'a Slide, media_index: &mut usize) -> Self {
        let mut shapes = String::new();
        let mut rels = String::new();
        let mut media = Vec::new();
        rels.push_str(&format!(
            r#"<Relationship Id="rId1" Type="{REL_BASE}/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>"#
        ));

        // id 1 is the slide's root group.
        for (offset, shape) in slide.shapes().iter().enumerate() {
            let id = offset + 2;
            match shape {
                Shape::Picture(pic) => {
                    *media_index += 1;
                    let name = format!("image{}.png", media_index);
                    let rid = format!("rId{}", media.len() + 2);
                    rels.push_str(&format!(
                        r#"<Relationship Id="{rid}" Type="{REL_BASE}/image" Target="../media/{name}"/>"#
                    ));
                    shapes.push_str(&picture_xml(id, &rid, pic));
                    media.push((name, pic.png.as_slice()));
                }
                Shape::Mask(mask) => shapes.push_str(&mask_xml(id, mask)),
                Shape::Text(tb) => shapes.push_str(&text_box_xml(id, tb)),
            }
        }

        let xml = format!(
            r#"{XML_DECL}<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:spTree>{GROUP_PROPS}{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
        );
        let rels = format!(r#"{XML_DECL}<Relationships xmlns="{NS_PKG_RELS}">{rels}</Relationships>"#);
        Self { xml, rels, media }
    }
}

fn xfrm(rect: &CanvasRect) -> String {
    format!(
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        rect.left,
        rect.top,
        rect.width.max(0),
        rect.height.max(0)
    )
}

fn hex(c: &Rgb<u8>) -> String {
    format!("{:02X}{:02X}{:02X}", c[0], c[1], c[2])
}

fn picture_xml(id: usize, rid: &str, pic: &Picture) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {id}" descr="{descr}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{rid}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
        descr = escape(&sanitize_xml_text(&pic.description)),
        xfrm = xfrm(&pic.rect),
    )
}

fn mask_xml(id: usize, mask: &MaskRect) -> String {
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Rectangle {id}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:solidFill><a:srgbClr val="{fill}"/></a:solidFill><a:ln><a:noFill/></a:ln><a:effectLst/></p:spPr></p:sp>"#,
        xfrm = xfrm(&mask.rect),
        fill = hex(&mask.fill),
    )
}

fn text_box_xml(id: usize, tb: &TextBox) -> String {
    let wrap = if tb.word_wrap { "square" } else { "none" };
    let insets = if tb.zero_margins {
        r#" lIns="0" tIns="0" rIns="0" bIns="0""#
    } else {
        ""
    };
    let mut paragraphs = String::new();
    for para in tb.paragraphs() {
        let text = sanitize_xml_text(para);
        if text.is_empty() {
            paragraphs.push_str(&format!(
                "<a:p>{}</a:p>",
                run_properties("a:endParaRPr", &tb.style)
            ));
        } else {
            paragraphs.push_str(&format!(
                "<a:p><a:r>{}<a:t>{}</a:t></a:r></a:p>",
                run_properties("a:rPr", &tb.style),
                escape(&text)
            ));
        }
    }
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="TextBox {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr><p:txBody><a:bodyPr wrap="{wrap}"{insets} rtlCol="0"><a:spAutoFit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#,
        xfrm = xfrm(&tb.rect),
    )
}

/// `<a:rPr>` (or `<a:endParaRPr>`) for `style`. Child order follows the
/// schema: fill before fonts, latin before east-asian.
fn run_properties(tag: &str, style: &TextStyle) -> String {
    let sz = ((style.size_pt * 100.0).round() as i64).clamp(MIN_FONT_SZ, MAX_FONT_SZ);
    let bold = match style.bold {
        Some(true) => r#" b="1""#,
        Some(false) => r#" b="0""#,
        None => "",
    };
    let mut children = String::new();
    if let Some(color) = &style.color {
        children.push_str(&format!(
            r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#,
            hex(color)
        ));
    }
    if let Some(face) = style.typeface {
        let face = escape(face);
        children.push_str(&format!(
            r#"<a:latin typeface="{face}"/><a:ea typeface="{face}"/>"#
        ));
    }
    format!(r#"<{tag} lang="{RUN_LANG}" sz="{sz}"{bold} dirty="0">{children}</{tag}>"#)
}

/// Drop characters XML 1.0 cannot carry (C0 controls other than tab, and
/// the non-characters U+FFFE/U+FFFF).
pub fn sanitize_xml_text(s: &str) -> String {
    s.chars()
        .filter(|&c| match c {
            '\t' => true,
            '\u{FFFE}' | '\u{FFFF}' => false,
            c => !c.is_ascii_control(),
        })
        .collect()
}

fn content_types(slide_count: usize) -> String {
    const CT: &str = "application/vnd.openxmlformats-officedocument";
    let mut overrides = String::new();
    for n in 1..=slide_count {
        overrides.push_str(&format!(
            r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="{CT}.presentationml.slide+xml"/>"#
        ));
    }
    format!(
        r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/ppt/presentation.xml" ContentType="{CT}.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="{CT}.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="{CT}.presentationml.slideLayout+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="{CT}.theme+xml"/><Override PartName="/ppt/presProps.xml" ContentType="{CT}.presentationml.presProps+xml"/><Override PartName="/ppt/viewProps.xml" ContentType="{CT}.presentationml.viewProps+xml"/><Override PartName="/ppt/tableStyles.xml" ContentType="{CT}.presentationml.tableStyles+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/><Override PartName="/docProps/app.xml" ContentType="{CT}.extended-properties+xml"/>{overrides}</Types>"#
    )
}

fn app_props(slide_count: usize) -> String {
    format!(
        r#"{XML_DECL}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes"><Application>{}</Application><Slides>{slide_count}</Slides></Properties>"#,
        env!("CARGO_PKG_NAME")
    )
}

fn presentation_xml(deck: &Presentation) -> String {
    let mut ids = String::new();
    for i in 0..deck.slides().len() {
        // Slide ids start at 256; rId1 is the master.
        ids.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 2));
    }
    let id_list = if ids.is_empty() {
        String::new()
    } else {
        format!("<p:sldIdLst>{ids}</p:sldIdLst>")
    };
    format!(
        r#"{XML_DECL}<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>{id_list}<p:sldSz cx="{}" cy="{}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
        deck.width(),
        deck.height()
    )
}

fn presentation_rels(slide_count: usize) -> String {
    let mut rels = format!(
        r#"<Relationship Id="rId1" Type="{REL_BASE}/slideMaster" Target="slideMasters/slideMaster1.xml"/>"#
    );
    for n in 1..=slide_count {
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{REL_BASE}/slide" Target="slides/slide{n}.xml"/>"#,
            n + 1
        ));
    }
    let next = slide_count + 2;
    for (offset, (kind, target)) in [
        ("presProps", "presProps.xml"),
        ("viewProps", "viewProps.xml"),
        ("theme", "theme/theme1.xml"),
        ("tableStyles", "tableStyles.xml"),
    ]
    .iter()
    .enumerate()
    {
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="{REL_BASE}/{kind}" Target="{target}"/>"#,
            next + offset
        ));
    }
    format!(r#"{XML_DECL}<Relationships xmlns="{NS_PKG_RELS}">{rels}</Relationships>"#)
}

const GROUP_PROPS: &str = r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/></Relationships>"#;

const CORE_PROPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:creator>pdf2pptx</dc:creator></cp:coreProperties>"#;

const PRES_PROPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentationPr xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"/>"#;

const VIEW_PROPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:viewPr xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:normalViewPr><p:restoredLeft sz="15620"/><p:restoredTop sz="94660"/></p:normalViewPr><p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#;

const TABLE_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><a:tblStyleLst xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" def="{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}"/>"#;

const SLIDE_MASTER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#;

const SLIDE_MASTER_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="../theme/theme1.xml"/></Relationships>"#;

const SLIDE_LAYOUT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" type="blank" preserve="1"><p:cSld name="Blank"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#;

const SLIDE_LAYOUT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="../slideMasters/slideMaster1.xml"/></Relationships>"#;

const THEME: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2><a:accent1><a:srgbClr val="4472C4"/></a:accent1><a:accent2><a:srgbClr val="ED7D31"/></a:accent2><a:accent3><a:srgbClr val="A5A5A5"/></a:accent3><a:accent4><a:srgbClr val="FFC000"/></a:accent4><a:accent5><a:srgbClr val="5B9BD5"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6><a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink></a:clrScheme><a:fontScheme name="Office"><a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst><a:lnStyleLst><a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst></a:fmtScheme></a:themeElements><a:objectDefaults/><a:extraClrSchemeLst/></a:theme>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::PictureRole;
    use quick_xml::events::Event;
    use quick_xml::Reader;
    use std::io::Read;

    fn rect(left: i64, top: i64, width: i64, height: i64) -> CanvasRect {
        CanvasRect {
            left,
            top,
            width,
            height,
        }
    }

    fn sample_deck() -> Presentation {
        let mut deck = Presentation::from_page_size_pt(720.0, 540.0);
        let slide = deck.add_slide();
        slide.push(Shape::Picture(Picture {
            rect: rect(0, 0, 9_144_000, 6_858_000),
            png: b"\x89PNG fake".to_vec(),
            role: PictureRole::Background,
            description: "page <1> & \"more\"".into(),
        }));
        slide.push(Shape::Mask(MaskRect {
            rect: rect(10, 20, 30, 40),
            fill: Rgb([0xC8, 0x10, 0xFF]),
        }));
        slide.push(Shape::Text(TextBox {
            rect: rect(10, 20, 30, 40),
            text: "Q&A <title>\nsecond\u{1}line\n".into(),
            style: TextStyle {
                size_pt: 19.8,
                bold: Some(true),
                typeface: Some("Meiryo"),
                color: Some(Rgb([0x12, 0x34, 0x56])),
            },
            zero_margins: true,
            word_wrap: true,
        }));
        deck.add_slide();
        deck
    }

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut part = archive.by_name(name).unwrap();
        let mut out = String::new();
        part.read_to_string(&mut out).unwrap();
        out
    }

    fn assert_well_formed(xml: &str) {
        let mut reader = Reader::from_str(xml);
        let mut depth = 0i32;
        loop {
            match reader.read_event() {
                Ok(Event::Start(_)) => depth += 1,
                Ok(Event::End(_)) => depth -= 1,
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("malformed XML: {e}\n{xml}"),
            }
        }
        assert_eq!(depth, 0, "unbalanced XML:\n{xml}");
    }

    #[test]
    fn package_contains_required_parts() {
        let bytes = to_bytes(&sample_deck()).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(&bytes)).unwrap();
        let names: Vec<_> = archive.file_names().collect();
        for part in [
            "[Content_Types].xml",
            "_rels/.rels",
            "ppt/presentation.xml",
            "ppt/slideMasters/slideMaster1.xml",
            "ppt/slideLayouts/slideLayout1.xml",
            "ppt/theme/theme1.xml",
            "ppt/slides/slide1.xml",
            "ppt/slides/slide2.xml",
            "ppt/slides/_rels/slide1.xml.rels",
            "ppt/media/image1.png",
        ] {
            assert!(names.contains(&part), "missing {part}");
        }
    }

    #[test]
    fn every_xml_part_is_well_formed() {
        let bytes = to_bytes(&sample_deck()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(&bytes)).unwrap();
        for i in 0..archive.len() {
            let mut part = archive.by_index(i).unwrap();
            let name = part.name().to_string();
            if name.ends_with(".xml") || name.ends_with(".rels") {
                let mut xml = String::new();
                part.read_to_string(&mut xml).unwrap();
                assert_well_formed(&xml);
            }
        }
    }

    #[test]
    fn slide_size_and_shape_order() {
        let bytes = to_bytes(&sample_deck()).unwrap();
        let pres = read_part(&bytes, "ppt/presentation.xml");
        assert!(pres.contains(r#"<p:sldSz cx="9144000" cy="6858000"/>"#));
        assert!(pres.contains(r#"<p:sldId id="257" r:id="rId3"/>"#));

        let slide = read_part(&bytes, "ppt/slides/slide1.xml");
        let pic = slide.find("<p:pic>").unwrap();
        let mask = slide.find(r#"name="Rectangle"#).unwrap();
        let text = slide.find(r#"txBox="1""#).unwrap();
        assert!(pic < mask && mask < text);
    }

    #[test]
    fn text_runs_carry_style_and_escaping() {
        let bytes = to_bytes(&sample_deck()).unwrap();
        let slide = read_part(&bytes, "ppt/slides/slide1.xml");
        assert!(slide.contains("<a:t>Q&amp;A &lt;title&gt;</a:t>"));
        assert!(slide.contains("<a:t>secondline</a:t>"));
        assert!(slide.contains(r#"sz="1980" b="1""#));
        assert!(slide.contains(r#"<a:srgbClr val="123456"/>"#));
        assert!(slide.contains(r#"<a:latin typeface="Meiryo"/><a:ea typeface="Meiryo"/>"#));
        assert!(slide.contains(r#"lIns="0" tIns="0" rIns="0" bIns="0""#));
        assert!(slide.contains(r#"wrap="square""#));
        // trailing newline → empty last paragraph
        assert!(slide.contains("<a:p><a:endParaRPr"));
    }

    #[test]
    fn every_paragraph_carries_the_block_style() {
        let bytes = to_bytes(&sample_deck()).unwrap();
        let slide = read_part(&bytes, "ppt/slides/slide1.xml");

        let mut props = Vec::new();
        for tag in ["a:rPr", "a:endParaRPr"] {
            let open = format!("<{tag} ");
            let close = format!("</{tag}>");
            let mut rest = slide.as_str();
            while let Some(start) = rest.find(&open) {
                let len = rest[start..].find(&close).unwrap() + close.len();
                props.push(rest[start..start + len].to_string());
                rest = &rest[start + len..];
            }
        }

        assert_eq!(slide.matches("<a:p>").count(), 3);
        assert_eq!(props.len(), 3, "one run property set per paragraph");
        for p in &props {
            assert!(p.contains(r#"sz="1980" b="1""#), "unstyled: {p}");
            assert!(p.contains(r#"<a:srgbClr val="123456"/>"#), "no colour: {p}");
            assert!(
                p.contains(r#"<a:latin typeface="Meiryo"/><a:ea typeface="Meiryo"/>"#),
                "no typeface: {p}"
            );
        }
    }

    #[test]
    fn mask_is_flat_and_borderless() {
        let bytes = to_bytes(&sample_deck()).unwrap();
        let slide = read_part(&bytes, "ppt/slides/slide1.xml");
        assert!(slide.contains(
            r#"<a:solidFill><a:srgbClr val="C810FF"/></a:solidFill><a:ln><a:noFill/></a:ln><a:effectLst/>"#
        ));
    }

    #[test]
    fn font_size_is_clamped_to_drawingml_range() {
        let style = TextStyle {
            size_pt: 0.2,
            bold: None,
            typeface: None,
            color: None,
        };
        assert!(run_properties("a:rPr", &style).contains(r#"sz="100""#));
    }

    #[test]
    fn sanitize_keeps_printable_and_tab() {
        assert_eq!(sanitize_xml_text("a\tb\u{0}c\u{1b}d é\u{FFFF}"), "a\tbcd é");
    }

    #[test]
    fn write_pptx_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.pptx");
        std::fs::write(&path, b"old").unwrap();
        write_pptx(&sample_deck(), &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], b"PK");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn unwritable_destination_is_reported() {
        let err = write_pptx(&sample_deck(), Path::new("/no/such/dir/deck.pptx")).unwrap_err();
        assert!(matches!(err, Pdf2PptxError::OutputWriteFailed { .. }));
    }
}
