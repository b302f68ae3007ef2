use super::{
    xml::{parse_document, Element},
    *,
};

const VARIABLE_SUFFIXES: [(&str, ResourceKind); 5] = [
    ("_document_array", ResourceKind::Collection),
    ("_document", ResourceKind::Collection),
    ("_link_array", ResourceKind::Link),
    ("_linkinst", ResourceKind::Link),
    ("_link", ResourceKind::Link),
];

/// `{link type}-{collection}_{collection}_link[_instance]`
#[derive(Debug, PartialEq, Eq)]
struct LinkBlock<'a> {
    link_type: &'a str,
    collection1: &'a str,
    collection2: &'a str,
    instance: bool,
}

impl<'a> LinkBlock<'a> {
    fn parse(block_type: &'a str) -> Option<Self> {
        let (body, instance) = match block_type.strip_suffix("_link_instance") {
            Some(body) => (body, true),
            None => (block_type.strip_suffix("_link")?, false),
        };
        let (link_type, collections) = body.split_once('-')?;
        let (collection1, collection2) = collections.split_once('_')?;
        [link_type, collection1, collection2]
            .iter()
            .all(|id| !id.is_empty())
            .then_some(Self {
                link_type,
                collection1,
                collection2,
                instance,
            })
    }

    fn other_end(&self, collection: &str) -> &'a str {
        if collection == self.collection1 {
            self.collection2
        } else {
            self.collection1
        }
    }
}

fn variable_resource(variable_type: &str) -> Option<ResourceReference> {
    VARIABLE_SUFFIXES.iter().find_map(|(suffix, kind)| {
        variable_type
            .strip_suffix(suffix)
            .filter(|id| !id.is_empty())
            .map(|id| ResourceReference::new(*kind, id))
    })
}

fn document_variable(block_type: &str) -> Option<&str> {
    block_type
        .strip_prefix("variables_get_")?
        .strip_suffix("_document")
        .filter(|id| !id.is_empty())
}

fn link_instance_variable(block_type: &str) -> Option<&str> {
    block_type
        .strip_prefix("variables_get_")?
        .strip_suffix("_linkinst")
        .filter(|id| !id.is_empty())
}

fn is_block(element: &Element) -> bool {
    element.name == "block" || element.name == "shadow"
}

fn block_type(element: &Element) -> Option<&str> {
    is_block(element).then(|| element.attribute("type")).flatten()
}

/// The block plugged into the named value input.
fn input_block<'e>(element: &'e Element, input: &str) -> Option<&'e Element> {
    element
        .child("value", input)
        .and_then(|value| value.elements().find(|child| is_block(child)))
}

fn block_resources(block_type: &str) -> Vec<ResourceReference> {
    if let Some(variable) = block_type.strip_prefix("variables_get_") {
        return variable_resource(variable).into_iter().collect();
    }
    match LinkBlock::parse(block_type) {
        Some(link) => vec![
            ResourceReference::link(link.link_type),
            ResourceReference::collection(link.collection1),
            ResourceReference::collection(link.collection2),
        ],
        None => vec![],
    }
}

/// Attribute read by a `get_attribute` block through its `DOCUMENT` input.
fn document_attribute(block: &Element) -> Option<AttributeRead> {
    let attribute = block.child("field", "ATTR")?.text();
    if attribute.is_empty() {
        return None;
    }
    let document = input_block(block, "DOCUMENT")?;
    let document_type = block_type(document)?;

    if let Some(collection) = document_variable(document_type) {
        return Some(AttributeRead::new(AttributeRef::collection(collection, attribute)));
    }

    let link = LinkBlock::parse(document_type).filter(|link| !link.instance)?;
    let source = input_block(document, "DOCUMENT")
        .and_then(block_type)
        .and_then(document_variable)?;
    Some(AttributeRead::via(
        AttributeRef::collection(link.other_end(source), attribute),
        link.link_type,
    ))
}

/// Attribute read by a link attribute block on whatever link instance feeds it.
fn link_attribute(block: &Element) -> Option<AttributeRead> {
    let attribute = block.child("field", "ATTR")?.text();
    if attribute.is_empty() {
        return None;
    }
    let link_type = block
        .elements()
        .filter(|child| child.name == "value")
        .flat_map(|value| value.descendants())
        .filter_map(block_type)
        .find_map(|nested| {
            link_instance_variable(nested).or_else(|| {
                LinkBlock::parse(nested)
                    .filter(|link| link.instance)
                    .map(|link| link.link_type)
            })
        })?;
    Some(AttributeRead::new(AttributeRef::link(link_type, attribute)))
}

/// Resources and attribute reads of a serialized visual program.
pub(super) fn extract_blockly(xml: &str) -> (BTreeSet<ResourceReference>, BTreeSet<AttributeRead>) {
    let mut resources = BTreeSet::new();
    let mut attributes = BTreeSet::new();

    let root = parse_document(xml);
    for element in root.descendants() {
        if element.name == "variable" {
            resources.extend(element.attribute("type").and_then(variable_resource));
        }
        resources.extend(element.attribute("variabletype").and_then(variable_resource));

        if element.name == "field" && element.attribute("name") == Some("COLLECTION") {
            let collection = element.text();
            if !collection.is_empty() {
                resources.insert(ResourceReference::collection(collection));
            }
        }

        if let Some(kind) = block_type(element) {
            resources.extend(block_resources(kind));
            let read = match kind {
                "get_attribute" => document_attribute(element),
                "get_link_attribute" | "get_link_instance_attribute" => link_attribute(element),
                _ => None,
            };
            attributes.extend(read);
        }
    }

    (resources, attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FUNCTION_XML: &str = r#"<xml xmlns="http://www.w3.org/1999/xhtml">
  <variables>
    <variable type="5c5b3f08b9437f682e35d3b7_document" id="vmD$A.@Qm/n7#9H[lf5h">i</variable>
    <variable type="5c5b3f01b9437f682e35d3b5_document" id="htj,W_{y[i#NwzoQ!U$W">oldDocument</variable>
  </variables>
  <block type="get_attribute" id="Y;8!va;ugQIbSzGFFKCp" x="43" y="21">
    <field name="ATTR">a1</field>
    <value name="DOCUMENT">
      <block type="5c5b6a73b9437f682e35d3ba-5c5b3f01b9437f682e35d3b5_5c5b3f08b9437f682e35d3b7_link" id=";p^MlH|U$AW`:;%(Q;t|">
        <value name="DOCUMENT">
          <block type="variables_get_5c5b3f01b9437f682e35d3b5_document" id=".li:)vGxD-oKU.=r:OqW" editable="false">
            <field name="VAR" id="htj,W_{y[i#NwzoQ!U$W" variabletype="5c5b3f01b9437f682e35d3b5_document">oldDocument</field>
          </block>
        </value>
      </block>
    </value>
  </block>
  <block type="statement_container" id="POz{9m#c(nQ6BaCwvv?f" deletable="false" x="108" y="83"></block>
  <block type="get_attribute" id="M-Y4:uqv@TZ7}z?UmJwj" x="153" y="213">
    <field name="ATTR">a3</field>
    <value name="DOCUMENT">
      <block type="variables_get_5c5b3f01b9437f682e35d3b5_document" id="z?C46ky2;E{|MPe%yg_v" editable="false">
        <field name="VAR" id="htj,W_{y[i#NwzoQ!U$W" variabletype="5c5b3f01b9437f682e35d3b5_document">oldDocument</field>
      </block>
    </value>
  </block>
  <block type="lists_length" id="xtlFH3agvZBzIh4sTKYD" x="37" y="281">
    <value name="VALUE">
      <block type="get_attribute" id="M*`q@i|N]vM?0t@@}Y0M">
        <field name="ATTR">a4</field>
        <value name="DOCUMENT">
          <block type="6c5b6a73b9437f682e35d3ba-6c5b3f01b9437f682e35d3b5_6c5b3f08b9437f682e35d3b7_link" id="N:5(]ib+gAzq**Zh9KBE">
            <value name="DOCUMENT">
              <block type="variables_get_6c5b3f01b9437f682e35d3b5_document" id="()?mhL#9R}TUWd))pO-z" editable="false">
                <field name="VAR" id="htj,W_{y[i#NwzoQ!U$W" variabletype="6c5b3f01b9437f682e35d3b5_document">oldDocument</field>
              </block>
            </value>
          </block>
        </value>
      </block>
    </value>
  </block>
  <block type="math_on_list" id=";BZp[kMNv!6,##-MS;_+" x="35" y="358">
    <mutation op="SUM"></mutation>
    <field name="OP">SUM</field>
    <value name="LIST">
      <block type="get_attribute" id="1}0R4y*|83|~#b;hKKdS">
        <field name="ATTR">a2</field>
        <value name="DOCUMENT">
          <block type="5c5b6a73b9437f682e35d3ba-5c5b3f01b9437f682e35d3b5_5c5b3f08b9437f682e35d3b7_link" id="}/ZHmn$oeWK+)e`OGsY5">
            <value name="DOCUMENT">
              <block type="variables_get_5c5b3f01b9437f682e35d3b5_document" id="UD{W?$BWGH(:.n[NrE2a" editable="false">
                <field name="VAR" id="+I50nE%$pl-gStL+#Ga4" variabletype="5c5b3f01b9437f682e35d3b5_document">newDocument</field>
              </block>
            </value>
          </block>
        </value>
      </block>
    </value>
  </block>
</xml>
"#;

    #[test]
    fn function_xml_attribute_reads() {
        let (resources, attributes) = extract_blockly(FUNCTION_XML);

        assert_eq!(
            attributes.into_iter().collect::<Vec<_>>(),
            vec![
                AttributeRead::new(AttributeRef::collection("5c5b3f01b9437f682e35d3b5", "a3")),
                AttributeRead::via(
                    AttributeRef::collection("5c5b3f08b9437f682e35d3b7", "a1"),
                    "5c5b6a73b9437f682e35d3ba"
                ),
                AttributeRead::via(
                    AttributeRef::collection("5c5b3f08b9437f682e35d3b7", "a2"),
                    "5c5b6a73b9437f682e35d3ba"
                ),
                AttributeRead::via(
                    AttributeRef::collection("6c5b3f08b9437f682e35d3b7", "a4"),
                    "6c5b6a73b9437f682e35d3ba"
                ),
            ]
        );

        assert!(resources.contains(&ResourceReference::link("5c5b6a73b9437f682e35d3ba")));
        assert!(resources.contains(&ResourceReference::collection("5c5b3f08b9437f682e35d3b7")));
        assert!(resources.contains(&ResourceReference::collection("6c5b3f01b9437f682e35d3b5")));
        assert_eq!(resources.len(), 6);
    }

    #[test]
    fn variable_and_block_types() {
        let xml = r#"<xml>
            <variables>
              <variable type="c1_document_array">docs</variable>
              <variable type="l1_linkinst">link</variable>
              <variable type="l2_link_array">links</variable>
              <variable type="_document">broken</variable>
            </variables>
            <block type="create_document"><field name="COLLECTION">c9</field></block>
            <block type="get_link_attribute">
              <field name="ATTR">a7</field>
              <value name="LINK"><block type="variables_get_l1_linkinst"/></value>
            </block>
            <block type="get_link_instance_attribute">
              <field name="ATTR">a8</field>
              <value name="LINK">
                <block type="l3-c1_c2_link_instance">
                  <value name="DOCUMENT"><block type="variables_get_c1_document"/></value>
                </block>
              </value>
            </block>
          </xml>"#;
        let (resources, attributes) = extract_blockly(xml);

        assert_eq!(
            resources.into_iter().collect::<Vec<_>>(),
            vec![
                ResourceReference::collection("c1"),
                ResourceReference::collection("c2"),
                ResourceReference::collection("c9"),
                ResourceReference::link("l1"),
                ResourceReference::link("l2"),
                ResourceReference::link("l3"),
            ]
        );
        assert_eq!(
            attributes.into_iter().collect::<Vec<_>>(),
            vec![
                AttributeRead::new(AttributeRef::link("l1", "a7")),
                AttributeRead::new(AttributeRef::link("l3", "a8")),
            ]
        );
    }

    #[test]
    fn identifiers_keep_their_case() {
        let xml = r#"<xml>
            <variable type="AbC_document">x</variable>
            <variable type="abc_document">y</variable>
          </xml>"#;
        let (resources, _) = extract_blockly(xml);
        assert_eq!(resources.len(), 2);
        assert!(resources.contains(&ResourceReference::collection("AbC")));
        assert!(resources.contains(&ResourceReference::collection("abc")));
    }

    #[test]
    fn link_block_parsing() {
        assert_eq!(
            LinkBlock::parse("l1-c1_c2_link"),
            Some(LinkBlock {
                link_type: "l1",
                collection1: "c1",
                collection2: "c2",
                instance: false
            })
        );
        assert!(LinkBlock::parse("l1-c1_c2_link_instance").unwrap().instance);
        assert_eq!(LinkBlock::parse("l1_link"), None);
        assert_eq!(LinkBlock::parse("-c1_c2_link"), None);
        assert_eq!(LinkBlock::parse("l1-c1_link"), None);
    }

    #[test]
    fn garbage_yields_nothing() {
        for input in ["", "not xml at all", "<block type=", "<<block>>", "</xml>"] {
            let (resources, attributes) = extract_blockly(input);
            assert!(resources.is_empty(), "{input}");
            assert!(attributes.is_empty(), "{input}");
        }
    }
}
