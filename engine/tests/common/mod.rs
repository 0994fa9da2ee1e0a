#![allow(dead_code)]

use cif::Document;
use cif_engine::{DictionarySet, load_text};

pub const CORE: &str = r#"#\#CIF_2.0
data_CORE_FIXTURE

_dictionary.title             CORE_FIXTURE
_dictionary.version           3.1.0
_dictionary.ddl_conformance   4.2.0

save_DIFFRN
    _definition.id                DIFFRN
    _definition.scope             Category
    _name.category_id             CIF_CORE
save_

save_diffrn.ambient_temperature
    _definition.id                '_diffrn.ambient_temperature'
    _definition.scope             Item
    _name.category_id             diffrn
    _type.contents                Real
    _description.text
;
    Mean temperature in kelvins at which the intensities were measured.
;
    loop_
      _alias.definition_id
      _alias.deprecation_date
         '_diffrn_ambient_temperature'     .
save_

save_diffrn.old_temperature
    _definition.id                '_diffrn.old_temperature'
    _definition.scope             Item
    _type.contents                Real
    _definition_replaced.id       1
    _definition_replaced.by       '_diffrn.ambient_temperature'
    _alias.definition_id          '_diffrn_old_temperature'
save_

save_diffrn.flux_density
    _definition.id                '_diffrn.flux_density'
    _definition.scope             Item
    _type.contents                Real
    _alias.definition_id          '_diffrn_flux_density'
save_

save_diffrn.total_exposure_time
    _definition.id                '_diffrn.total_exposure_time'
    _definition.scope             Item
    _type.contents                Real
    _alias.definition_id          '_diffrn_total_exposure_time'
save_

save_diffrn_source.make
    _definition.id                '_diffrn_source.make'
    _definition.scope             Item
    _name.category_id             diffrn_source
    _type.contents                Text
    loop_
      _alias.definition_id
      _alias.deprecation_date
         '_diffrn_source_make'     .
         '_diffrn_source_type'     2021-08-18
save_

save_diffrn_radiation.probe
    _definition.id                '_diffrn_radiation.probe'
    _definition.scope             Item
    _type.contents                Code
    _enumeration.default          x-ray
    _alias.definition_id          '_diffrn_radiation_probe'
    loop_
      _enumeration_set.state
         x-ray
         neutron
         electron
         gamma
save_

save_publ_section.references
    _definition.id                '_publ_section.references'
    _definition.scope             Item
    _type.contents                Text
    _alias.definition_id          '_publ_section_references'
save_

save_cell.volume
    _definition.id                '_cell.volume'
    _definition.scope             Item
    _name.category_id             cell
    _type.contents                Real
    _alias.definition_id          '_cell_volume'
save_

save_symmetry.cell_setting
    _definition.id                '_symmetry.cell_setting'
    _definition.scope             Item
    _type.contents                Code
    _definition_replaced.id       1
    _definition_replaced.by       .
    _alias.definition_id          '_symmetry_cell_setting'
save_
"#;

pub const LEGACY: &str = "\
data_on_this_dictionary
    _dictionary_name            legacy_fixture.dic
    _dictionary_version         2.4
    _dictionary_update          2020-01-01

data_diffrn_ambient_temperature
    _name                       '_diffrn_ambient_temperature'
    _category                   diffrn
    _type                       numb

data_exptl_crystal_colour
    _name                       '_exptl_crystal_colour'
    _category                   exptl_crystal
    _type                       char

data_exptl_crystal_color
    _name                       '_exptl_crystal_color'
    _category                   exptl_crystal
    _type                       char
    _related_item               '_exptl_crystal_colour'
    _related_function           replace
";

pub fn core() -> DictionarySet {
    load_text("core_fixture.dic", CORE).expect("fixture dictionary failed to load")
}

pub fn legacy() -> DictionarySet {
    load_text("legacy_fixture.dic", LEGACY).expect("fixture dictionary failed to load")
}

pub fn parse(source: &str) -> Document {
    cif::parse(source).expect("parse failed")
}
