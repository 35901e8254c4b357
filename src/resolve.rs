use std::collections::HashMap;

use crate::model::Category;

/// One special-cased sub-grouping: a marker row label together with the
/// closed set of indicator display names that belong under it.
#[derive(Debug, Clone, Copy)]
pub struct Subgroup {
    pub marker: &'static str,
    pub members: &'static [&'static str],
}

/// Fixed domain vocabulary of recognised sub-groupings. Names outside every
/// member list always fall back to the board category.
pub const SUBGROUPS: &[Subgroup] = &[
    Subgroup {
        marker: "分部门新增就业",
        members: &[
            "采矿业",
            "建筑业",
            "制造业",
            "批发业",
            "零售业",
            "运输仓储业",
            "公用事业",
            "信息业",
            "金融活动",
            "专业和商业服务",
            "教育和保健服务",
            "休闲和酒店业",
            "其他服务业",
            "政府",
        ],
    },
    Subgroup {
        marker: "分项 CPI",
        members: &[
            "食品",
            "家庭食品",
            "在外饮食",
            "能源",
            "能源商品",
            "燃油和其他燃料",
            "发动机燃料（汽油）",
            "能源服务",
            "电力",
            "公用管道燃气服务",
            "核心商品（不含食品和能源类）",
            "家具和其他家用产品",
            "服饰",
            "交通工具（不含汽车燃料）",
            "新车",
            "二手汽车和卡车",
            "机动车部件和设备",
            "医疗用品",
            "酒精饮料",
            "核心服务（不含能源）",
            "住所",
            "房租",
            "水、下水道和垃圾回收",
            "家庭运营",
            "医疗服务",
            "运输服务",
        ],
    },
    Subgroup {
        marker: "季调各类型失业率",
        members: &["U-1", "U-2", "U-3", "U-4", "U-5", "U-6"],
    },
];

/// Whether a category-marker row names one of the recognised sub-groupings.
/// Markers outside the vocabulary are plain category rows with no effect.
pub fn is_subgroup_marker(name: &str) -> bool {
    SUBGROUPS.iter().any(|group| group.marker == name)
}

/// Member list for a recognised sub-grouping marker.
pub fn subgroup_members(marker: &str) -> Option<&'static [&'static str]> {
    SUBGROUPS
        .iter()
        .find(|group| group.marker == marker)
        .map(|group| group.members)
}

/// Picks the category an indicator row attaches to.
///
/// Defaults to the board category. When the board has a pending subcategory
/// whose marker vocabulary contains the indicator's display name, the
/// subcategory wins. The pending map is orchestration state owned by the
/// caller, scoped to one run.
pub fn resolve_category(
    board: &str,
    indicator_name: &str,
    board_category_id: i64,
    pending: &HashMap<String, Category>,
) -> i64 {
    let Some(subcategory) = pending.get(board) else {
        return board_category_id;
    };

    match subgroup_members(&subcategory.name) {
        Some(members) if members.contains(&indicator_name) => subcategory.id,
        _ => board_category_id,
    }
}
