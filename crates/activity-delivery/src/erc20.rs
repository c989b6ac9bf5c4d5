//! ERC-20 bindings shared by the delivery layer and token activities.

use alloy_sol_types::sol;

sol! {
	/// Subset of the ERC-20 interface the bot touches.
	interface IERC20 {
		function balanceOf(address account) external view returns (uint256 balance);
		function allowance(address owner, address spender) external view returns (uint256 remaining);
		function approve(address spender, uint256 amount) external returns (bool success);
	}
}
