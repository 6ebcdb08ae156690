//! Foreign content (SVG and MathML) adjustment tables.
//!
//! [§ 13.2.6.5 The rules for parsing tokens in foreign content](https://html.spec.whatwg.org/multipage/parsing.html#parsing-main-inforeign)
//!
//! HTML tokenization lower-cases every name, so camel-cased SVG tag and
//! attribute names and the namespaced `xlink:`/`xml:`/`xmlns` attributes
//! have to be restored from fixed lookup tables when their elements land
//! in foreign content. All three tables are process-wide immutable
//! constants.

use wombat_dom::{Attribute, XLINK_NAMESPACE, XML_NAMESPACE, XMLNS_NAMESPACE};

/// [§ 13.2.6.5 Adjust SVG tag names](https://html.spec.whatwg.org/multipage/parsing.html#parsing-main-inforeign)
///
/// lower-cased name → camel-cased SVG element name.
static SVG_TAG_MAP: &[(&str, &str)] = &[
    ("altglyph", "altGlyph"),
    ("altglyphdef", "altGlyphDef"),
    ("altglyphitem", "altGlyphItem"),
    ("animatecolor", "animateColor"),
    ("animatemotion", "animateMotion"),
    ("animatetransform", "animateTransform"),
    ("clippath", "clipPath"),
    ("feblend", "feBlend"),
    ("fecolormatrix", "feColorMatrix"),
    ("fecomponenttransfer", "feComponentTransfer"),
    ("fecomposite", "feComposite"),
    ("feconvolvematrix", "feConvolveMatrix"),
    ("fediffuselighting", "feDiffuseLighting"),
    ("fedisplacementmap", "feDisplacementMap"),
    ("fedistantlight", "feDistantLight"),
    ("feflood", "feFlood"),
    ("fefunca", "feFuncA"),
    ("fefuncb", "feFuncB"),
    ("fefuncg", "feFuncG"),
    ("fefuncr", "feFuncR"),
    ("fegaussianblur", "feGaussianBlur"),
    ("feimage", "feImage"),
    ("femerge", "feMerge"),
    ("femergenode", "feMergeNode"),
    ("femorphology", "feMorphology"),
    ("feoffset", "feOffset"),
    ("fepointlight", "fePointLight"),
    ("fespecularlighting", "feSpecularLighting"),
    ("fespotlight", "feSpotLight"),
    ("fetile", "feTile"),
    ("feturbulence", "feTurbulence"),
    ("foreignobject", "foreignObject"),
    ("glyphref", "glyphRef"),
    ("lineargradient", "linearGradient"),
    ("radialgradient", "radialGradient"),
    ("textpath", "textPath"),
];

/// [§ 13.2.6.5 Adjust MathML attributes](https://html.spec.whatwg.org/multipage/parsing.html#adjust-mathml-attributes)
static MATHML_ATTRIBUTE_MAP: &[(&str, &str)] = &[("definitionurl", "definitionURL")];

/// [§ 13.2.6.5 Adjust SVG attributes](https://html.spec.whatwg.org/multipage/parsing.html#adjust-svg-attributes)
static SVG_ATTRIBUTE_MAP: &[(&str, &str)] = &[
    ("attributename", "attributeName"),
    ("attributetype", "attributeType"),
    ("basefrequency", "baseFrequency"),
    ("baseprofile", "baseProfile"),
    ("calcmode", "calcMode"),
    ("clippathunits", "clipPathUnits"),
    ("contentscripttype", "contentScriptType"),
    ("contentstyletype", "contentStyleType"),
    ("diffuseconstant", "diffuseConstant"),
    ("edgemode", "edgeMode"),
    ("externalresourcesrequired", "externalResourcesRequired"),
    ("filterres", "filterRes"),
    ("filterunits", "filterUnits"),
    ("glyphref", "glyphRef"),
    ("gradienttransform", "gradientTransform"),
    ("gradientunits", "gradientUnits"),
    ("kernelmatrix", "kernelMatrix"),
    ("kernelunitlength", "kernelUnitLength"),
    ("keypoints", "keyPoints"),
    ("keysplines", "keySplines"),
    ("keytimes", "keyTimes"),
    ("lengthadjust", "lengthAdjust"),
    ("limitingconeangle", "limitingConeAngle"),
    ("markerheight", "markerHeight"),
    ("markerunits", "markerUnits"),
    ("markerwidth", "markerWidth"),
    ("maskcontentunits", "maskContentUnits"),
    ("maskunits", "maskUnits"),
    ("numoctaves", "numOctaves"),
    ("pathlength", "pathLength"),
    ("patterncontentunits", "patternContentUnits"),
    ("patterntransform", "patternTransform"),
    ("patternunits", "patternUnits"),
    ("pointsatx", "pointsAtX"),
    ("pointsaty", "pointsAtY"),
    ("pointsatz", "pointsAtZ"),
    ("preservealpha", "preserveAlpha"),
    ("preserveaspectratio", "preserveAspectRatio"),
    ("primitiveunits", "primitiveUnits"),
    ("refx", "refX"),
    ("refy", "refY"),
    ("repeatcount", "repeatCount"),
    ("repeatdur", "repeatDur"),
    ("requiredextensions", "requiredExtensions"),
    ("requiredfeatures", "requiredFeatures"),
    ("specularconstant", "specularConstant"),
    ("specularexponent", "specularExponent"),
    ("spreadmethod", "spreadMethod"),
    ("startoffset", "startOffset"),
    ("stddeviation", "stdDeviation"),
    ("stitchtiles", "stitchTiles"),
    ("surfacescale", "surfaceScale"),
    ("systemlanguage", "systemLanguage"),
    ("tablevalues", "tableValues"),
    ("targetx", "targetX"),
    ("targety", "targetY"),
    ("textlength", "textLength"),
    ("viewbox", "viewBox"),
    ("viewtarget", "viewTarget"),
    ("xchannelselector", "xChannelSelector"),
    ("ychannelselector", "yChannelSelector"),
    ("zoomandpan", "zoomAndPan"),
];

/// [§ 13.2.6.5 Adjust foreign attributes](https://html.spec.whatwg.org/multipage/parsing.html#adjust-foreign-attributes)
///
/// (attribute name, prefix, local name, namespace URI).
static FOREIGN_ATTRIBUTE_MAP: &[(&str, Option<&str>, &str, &str)] = &[
    ("xlink:actuate", Some("xlink"), "actuate", XLINK_NAMESPACE),
    ("xlink:arcrole", Some("xlink"), "arcrole", XLINK_NAMESPACE),
    ("xlink:href", Some("xlink"), "href", XLINK_NAMESPACE),
    ("xlink:role", Some("xlink"), "role", XLINK_NAMESPACE),
    ("xlink:show", Some("xlink"), "show", XLINK_NAMESPACE),
    ("xlink:title", Some("xlink"), "title", XLINK_NAMESPACE),
    ("xlink:type", Some("xlink"), "type", XLINK_NAMESPACE),
    ("xml:base", Some("xml"), "base", XML_NAMESPACE),
    ("xml:lang", Some("xml"), "lang", XML_NAMESPACE),
    ("xml:space", Some("xml"), "space", XML_NAMESPACE),
    ("xmlns", None, "xmlns", XMLNS_NAMESPACE),
    ("xmlns:xlink", Some("xmlns"), "xlink", XMLNS_NAMESPACE),
];

/// Restore the camel-cased SVG element name for a lower-cased tag name.
#[must_use]
pub fn adjust_svg_tag_name(name: &str) -> &str {
    SVG_TAG_MAP
        .iter()
        .find(|(from, _)| *from == name)
        .map_or(name, |(_, to)| to)
}

/// Restore camel-cased MathML attribute names in place.
pub fn adjust_mathml_attributes(attributes: &mut [Attribute]) {
    adjust_attribute_case(attributes, MATHML_ATTRIBUTE_MAP);
}

/// Restore camel-cased SVG attribute names in place.
pub fn adjust_svg_attributes(attributes: &mut [Attribute]) {
    adjust_attribute_case(attributes, SVG_ATTRIBUTE_MAP);
}

fn adjust_attribute_case(attributes: &mut [Attribute], map: &[(&str, &str)]) {
    for attr in attributes {
        if let Some((_, adjusted)) = map.iter().find(|(from, _)| *from == attr.name) {
            attr.name = (*adjusted).to_string();
        }
    }
}

/// Bind `xlink:*`, `xml:*` and `xmlns` attributes to their namespaces
/// in place.
pub fn adjust_foreign_attributes(attributes: &mut [Attribute]) {
    for attr in attributes {
        if let Some((_, prefix, local, namespace)) = FOREIGN_ATTRIBUTE_MAP
            .iter()
            .find(|(from, ..)| *from == attr.name)
        {
            attr.prefix = prefix.map(ToString::to_string);
            attr.local_name = Some((*local).to_string());
            attr.namespace_uri = Some((*namespace).to_string());
        }
    }
}
